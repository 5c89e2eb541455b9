use rusqlite::{Connection, Result};

use super::{AsnRecord, StoredPrefix};

pub(super) trait DBTable {
    fn create_table(conn: &Connection) -> Result<()>;
}

/// Community values, existence only
pub(super) struct Community;

/// Prefix <-> Community junction
pub(super) struct PrefixCommunity;

pub(super) fn create_tables(conn: &Connection) -> Result<()> {
    AsnRecord::create_table(conn)?;
    StoredPrefix::create_table(conn)?;
    Community::create_table(conn)?;
    PrefixCommunity::create_table(conn)?;
    Ok(())
}

impl DBTable for AsnRecord {
    fn create_table(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS asn (
                asn INTEGER PRIMARY KEY,
                as_name TEXT
            )",
        )
    }
}

impl DBTable for StoredPrefix {
    fn create_table(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prefix (
                id INTEGER PRIMARY KEY,
                asn_id INTEGER NOT NULL REFERENCES asn(asn),
                asn_path TEXT NOT NULL,
                prefix TEXT NOT NULL,
                family TEXT NOT NULL,
                next_hops TEXT NOT NULL,
                neighbor TEXT,
                ixp TEXT NOT NULL,
                last_seen BIGINT NOT NULL,
                age BIGINT
            );
            CREATE UNIQUE INDEX IF NOT EXISTS prefix_asn_id_prefix ON prefix (asn_id, prefix);
            CREATE INDEX IF NOT EXISTS prefix_last_seen ON prefix (last_seen);",
        )
    }
}

impl DBTable for Community {
    fn create_table(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS community (
                id INTEGER PRIMARY KEY
            )",
        )
    }
}

impl DBTable for PrefixCommunity {
    fn create_table(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prefix_communities (
                prefix_id INTEGER NOT NULL REFERENCES prefix(id) ON DELETE CASCADE,
                community_id INTEGER NOT NULL REFERENCES community(id),
                PRIMARY KEY (prefix_id, community_id)
            )",
        )
    }
}
