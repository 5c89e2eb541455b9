use std::convert::TryFrom;
use std::fmt::Display;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ipnetwork::IpNetwork;
use itertools::Itertools;
use log::{debug, trace};
use rusqlite::types::Type;
use rusqlite::{
    ffi, params, Connection, Error as RError, ErrorCode, OptionalExtension, Row,
    TransactionBehavior,
};
use tokio::sync::Semaphore;

use super::tables::create_tables;
use super::{AsnRecord, Store, StoreError, StoredPrefix, Upsert};
use crate::paths::{AddressFamily, CanonicalRoute};

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connections to one SQLite file, checked out by blocking workers
struct Pool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    permits: Semaphore,
}

impl Pool {
    fn checkout(&self) -> Result<Connection, StoreError> {
        let conn = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();
        match conn {
            Some(conn) => Ok(conn),
            None => {
                trace!("Opening new connection to {}", self.path.display());
                Ok(connect(&self.path)?)
            }
        }
    }

    fn checkin(&self, conn: Connection) {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(conn);
    }
}

fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(conn)
}

/// `Store` backed by a SQLite database in WAL mode.
/// At most `pool_size` queries run at once.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<Pool>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P, pool_size: usize) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = connect(&path)?;
        create_tables(&conn)?;
        debug!("Opened prefix database {}", path.display());
        Ok(Self {
            pool: Arc::new(Pool {
                path,
                idle: Mutex::new(vec![conn]),
                permits: Semaphore::new(pool_size.max(1)),
            }),
        })
    }

    /// Run `query` on a pooled connection in the blocking thread pool
    async fn with_conn<F, T>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .pool
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.checkout()?;
            let result = query(&mut conn);
            pool.checkin(conn);
            result
        })
        .await?
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn find_asn(&self, asn: u32) -> Result<Option<AsnRecord>, StoreError> {
        self.with_conn(move |conn| {
            let record = conn
                .query_row(
                    "SELECT asn, as_name FROM asn WHERE asn = ?1",
                    params![asn],
                    |row| {
                        Ok(AsnRecord {
                            asn: row.get(0)?,
                            as_name: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn insert_asn(&self, asn: u32, as_name: Option<&str>) -> Result<(), StoreError> {
        let as_name = as_name.map(str::to_string);
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO asn (asn, as_name) VALUES (?1, ?2)",
                params![asn, as_name],
            );
            ignore_duplicate(inserted)?;
            Ok(())
        })
        .await
    }

    async fn set_as_name(&self, asn: u32, as_name: &str) -> Result<(), StoreError> {
        let as_name = as_name.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE asn SET as_name = ?2 WHERE asn = ?1",
                params![asn, as_name],
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_prefix(
        &self,
        route: &CanonicalRoute,
        last_seen: DateTime<Utc>,
    ) -> Result<Upsert, StoreError> {
        let route = route.clone();
        self.with_conn(move |conn| upsert(conn, &route, last_seen))
            .await
    }

    async fn find_prefix(
        &self,
        asn_id: u32,
        prefix: IpNetwork,
    ) -> Result<Option<StoredPrefix>, StoreError> {
        self.with_conn(move |conn| find_prefix(conn, asn_id, &prefix))
            .await
    }

    async fn prefix_communities(&self, prefix_id: i64) -> Result<Vec<u32>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT community_id FROM prefix_communities
                WHERE prefix_id = ?1 ORDER BY community_id ASC",
            )?;
            let communities = stmt
                .query_map(params![prefix_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<u32>>>()?;
            Ok(communities)
        })
        .await
    }

    async fn count_prefixes(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM prefix", [], |row| row.get(0))?;
            Ok(to_count(count)?)
        })
        .await
    }

    async fn latest_seen(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.with_conn(|conn| {
            let latest: Option<i64> =
                conn.query_row("SELECT MAX(last_seen) FROM prefix", [], |row| row.get(0))?;
            Ok(latest.and_then(from_millis))
        })
        .await
    }

    async fn count_stale(&self, timeout: Duration) -> Result<usize, StoreError> {
        let timeout = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM prefix
                WHERE last_seen < (SELECT MAX(last_seen) FROM prefix) - ?1",
                params![timeout],
                |row| row.get(0),
            )?;
            Ok(to_count(count)?)
        })
        .await
    }
}

/// Steps after ASN resolution, in a single IMMEDIATE transaction
fn upsert(
    conn: &mut Connection,
    route: &CanonicalRoute,
    last_seen: DateTime<Utc>,
) -> Result<Upsert, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let result = match find_prefix(&tx, route.source_asn, &route.prefix)? {
        Some(existing) => {
            update_prefix(&tx, existing.id, route, last_seen)?;
            Upsert::Updated(existing.id)
        }
        None => Upsert::Inserted(insert_prefix(&tx, route, last_seen)?),
    };
    for community in &route.communities {
        insert_community(&tx, *community)?;
        link_community(&tx, result.id(), *community)?;
    }
    tx.commit()?;
    trace!("{:?} {}", result, route.id());
    Ok(result)
}

fn find_prefix(
    conn: &Connection,
    asn_id: u32,
    prefix: &IpNetwork,
) -> Result<Option<StoredPrefix>, StoreError> {
    let prefix = conn
        .query_row(
            "SELECT id, asn_id, asn_path, prefix, next_hops, neighbor, ixp, last_seen, age
            FROM prefix WHERE asn_id = ?1 AND prefix = ?2",
            params![asn_id, prefix.to_string()],
            |row| StoredPrefix::try_from(row),
        )
        .optional()?;
    Ok(prefix)
}

fn insert_prefix(
    conn: &Connection,
    route: &CanonicalRoute,
    last_seen: DateTime<Utc>,
) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO prefix
            (asn_id, asn_path, prefix, family, next_hops, neighbor, ixp, last_seen, age)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            route.source_asn,
            join_column(&route.asn_path),
            route.prefix.to_string(),
            AddressFamily::of(&route.prefix).to_string(),
            join_column(&route.next_hops),
            route.neighbor.map(|n| n.to_string()),
            route.ixp,
            last_seen.timestamp_millis(),
            route.age.map(|age| age.timestamp_millis()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Identity columns (`asn_id`, `prefix`) are left alone
fn update_prefix(
    conn: &Connection,
    id: i64,
    route: &CanonicalRoute,
    last_seen: DateTime<Utc>,
) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE prefix SET
            asn_path = ?2, next_hops = ?3, neighbor = ?4, ixp = ?5, last_seen = ?6, age = ?7
        WHERE id = ?1",
        params![
            id,
            join_column(&route.asn_path),
            join_column(&route.next_hops),
            route.neighbor.map(|n| n.to_string()),
            route.ixp,
            last_seen.timestamp_millis(),
            route.age.map(|age| age.timestamp_millis()),
        ],
    )?;
    Ok(())
}

fn insert_community(conn: &Connection, community: u32) -> Result<(), StoreError> {
    ignore_duplicate(conn.execute(
        "INSERT INTO community (id) VALUES (?1)",
        params![community],
    ))?;
    Ok(())
}

fn link_community(conn: &Connection, prefix_id: i64, community: u32) -> Result<(), StoreError> {
    ignore_duplicate(conn.execute(
        "INSERT INTO prefix_communities (prefix_id, community_id) VALUES (?1, ?2)",
        params![prefix_id, community],
    ))?;
    Ok(())
}

/// Unique/primary key violations mean the row is already there
fn ignore_duplicate(result: rusqlite::Result<usize>) -> rusqlite::Result<usize> {
    match result {
        Err(RError::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation
                && (err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE) =>
        {
            Ok(0)
        }
        result => result,
    }
}

fn join_column<T: Display>(values: &[T]) -> String {
    values.iter().join(" ")
}

fn split_column<T>(column: &str) -> Result<Vec<T>, T::Err>
where
    T: FromStr,
{
    column.split_whitespace().map(str::parse).collect()
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

fn to_count(count: i64) -> Result<usize, RError> {
    usize::try_from(count).map_err(|err| conversion_error(0, Type::Integer, err))
}

fn conversion_error<E>(index: usize, kind: Type, err: E) -> RError
where
    E: std::error::Error + Send + Sync + 'static,
{
    RError::FromSqlConversionFailure(index, kind, Box::new(err))
}

impl<'a> TryFrom<&Row<'a>> for StoredPrefix {
    type Error = RError;

    fn try_from(row: &Row<'a>) -> Result<Self, Self::Error> {
        let asn_path = row
            .get(2)
            .map(|asn_path: String| split_column::<u32>(&asn_path))?
            .map_err(|err| conversion_error(2, Type::Text, err))?;
        let prefix = row
            .get(3)
            .map(|prefix: String| prefix.parse::<IpNetwork>())?
            .map_err(|err| conversion_error(3, Type::Text, err))?;
        let next_hops = row
            .get(4)
            .map(|next_hops: String| split_column::<IpAddr>(&next_hops))?
            .map_err(|err| conversion_error(4, Type::Text, err))?;
        let neighbor = row
            .get(5)
            .map(|neighbor: Option<String>| neighbor.map(|n| n.parse::<IpAddr>()))?
            .transpose()
            .map_err(|err| conversion_error(5, Type::Text, err))?;
        let last_seen = row
            .get(7)
            .map(from_millis)?
            .ok_or(RError::IntegralValueOutOfRange(7, 0))?;
        let age = row
            .get(8)
            .map(|age: Option<i64>| age.and_then(from_millis))?;
        Ok(StoredPrefix {
            id: row.get(0)?,
            asn_id: row.get(1)?,
            asn_path,
            prefix,
            next_hops,
            neighbor,
            ixp: row.get(6)?,
            last_seen,
            age,
        })
    }
}
