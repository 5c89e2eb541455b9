use std::io::Result;

use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use tokio::runtime::Runtime;

use lg_prefixes::cli::{run, Args};

fn main() -> Result<()> {
    let args = Args::parse();

    let (import_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("lg_prefixes"), import_level)
        .filter(None, other_level)
        .init();
    info!("Logging at levels {}/{}", import_level, other_level);

    let runtime = Runtime::new()?;
    let code = runtime.block_on(run(&args));
    std::process::exit(code);
}
