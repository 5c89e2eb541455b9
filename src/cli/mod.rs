//! # lg-prefixes CLI
//!
//! Loads the global RIB of a running GoBGP daemon into the looking glass
//! prefix database, resolving the name of every source AS along the way.
//!
//! ```sh
//! $ lg-prefixes --source rs1.example.net:50051 import --family v4
//! IPv4 Unicast: 3 imported, 0 failed, 1 blacklisted, 0 invalid, 0 stale (00:00:01)
//!  ASN     AS Name                  Prefixes
//! -------+------------------------+----------
//!  64500   EXAMPLE-AS               2
//!  210083  Privex Inc.              1
//! ```
//!
//! `stale` shows prefixes that weren't seen by the latest import,
//! `asn <ASN>` looks up (and stores) a single AS name.

mod display;

use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use log::debug;

use crate::asn::{AsnResolver, CymruNameService};
use crate::config::{self, ImportConfig};
use crate::db::{SqliteStore, Store};
use crate::importer::{ImportSummary, Importer};
use crate::paths::AddressFamily;
use crate::source::GobgpSource;
use crate::utils::{format_elapsed_time, format_time_as_elapsed};

use display::{print_table, AsCountRow};

#[derive(Parser, Debug)]
#[clap(name = "lg-prefixes", rename_all = "kebab-case")]
/// Import BGP prefixes from GoBGP into the looking glass database
pub struct Args {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Path to config.toml (all settings have defaults)
    #[clap(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// GoBGP gRPC endpoint, e.g. localhost:50051 (overrides config)
    #[clap(long, global = true)]
    pub source: Option<String>,
    /// SQLite database path (overrides config)
    #[clap(long, global = true)]
    pub database: Option<String>,
    /// Don't print summaries, only logs
    #[clap(short, long, global = true)]
    pub quiet: bool,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences), global = true)]
    pub verbose: u8,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Import paths for one or both address families
    #[clap(alias = "i")]
    Import(ImportOptions),
    /// Show when prefixes were last seen and how many are stale
    Stale,
    /// Resolve the name of an AS
    Asn(AsnOptions),
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub struct ImportOptions {
    /// Address family [v4, v6, all]
    #[clap(short, long, default_value = "all")]
    pub family: Families,
    /// Print import summaries as JSON
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub struct AsnOptions {
    #[clap()]
    pub asn: u32,
}

/// Address families selected on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Families(pub Vec<AddressFamily>);

impl FromStr for Families {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "both" => Ok(Families(AddressFamily::all().to_vec())),
            family => Ok(Families(vec![family.parse()?])),
        }
    }
}

/// Config file (or defaults) with command line overrides applied
pub fn load_config(args: &Args) -> Result<ImportConfig, config::ConfigError> {
    let mut config = match &args.config {
        Some(path) => config::from_file(path)?,
        None => ImportConfig::default(),
    };
    if let Some(source) = &args.source {
        config.route_source = source.clone();
    }
    if let Some(database) = &args.database {
        config.database = database.clone();
    }
    debug!("{:?}", config);
    Ok(config)
}

async fn run_cmd(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;
    let store = Arc::new(SqliteStore::open(&config.database, config.concurrency)?);
    match &args.cmd {
        Command::Import(options) => {
            let source = Arc::new(GobgpSource::new(&config.route_source));
            let importer = Importer::new(
                config.clone(),
                source,
                store.clone(),
                Arc::new(CymruNameService::new()),
            );
            let mut summaries: Vec<ImportSummary> = Vec::with_capacity(2);
            for family in &options.family.0 {
                summaries.push(importer.import(*family).await?);
            }
            if options.json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if !args.quiet {
                for summary in &summaries {
                    print_summary(summary, importer.resolver()).await?;
                }
            }
        }
        Command::Stale => {
            let total = store.count_prefixes().await?;
            let stale = store.count_stale(config.prefix_timeout).await?;
            if !args.quiet {
                match store.latest_seen().await? {
                    Some(latest) => println!(
                        "Latest import {} ago ({})",
                        format_time_as_elapsed(latest),
                        latest.format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                    None => println!("No prefixes imported yet"),
                }
                println!(
                    "{} of {} prefixes are stale (not seen for {})",
                    stale,
                    total,
                    format_elapsed_time(config.prefix_timeout)
                );
            }
        }
        Command::Asn(options) => {
            let resolver = AsnResolver::new(
                config.local_asn,
                &config.local_as_name,
                store,
                Arc::new(CymruNameService::new()),
            );
            let name = resolver.resolve(options.asn).await?;
            println!("AS{}: {}", options.asn, name);
        }
    }
    Ok(())
}

async fn print_summary(
    summary: &ImportSummary,
    resolver: &AsnResolver,
) -> Result<(), Box<dyn Error>> {
    println!(
        "{}: {} imported, {} failed, {} blacklisted, {} invalid, {} stale ({})",
        summary.family.unicast(),
        summary.succeeded,
        summary.failed.len(),
        summary.blacklisted,
        summary.invalid,
        summary.stale,
        format_elapsed_time(summary.elapsed),
    );
    let mut rows = Vec::with_capacity(summary.as_counts.len());
    for (asn, prefixes) in &summary.as_counts {
        rows.push(AsCountRow {
            asn: *asn,
            name: resolver.resolve(*asn).await?,
            prefixes: *prefixes,
        });
    }
    print_table(&rows);
    if !summary.failed.is_empty() {
        println!("{}", "Failed routes:".red());
        print_table(&summary.failed);
    }
    println!();
    Ok(())
}

/// Run one CLI command, returning the process exit code
pub async fn run(args: &Args) -> i32 {
    match run_cmd(args).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err.to_string().red());
            1
        }
    }
}
