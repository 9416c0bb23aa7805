use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use claude_mem_import_api::{
    default_source_db, ImportConfig, Importer, MarkerProgress, DEFAULT_BASE_URL,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cmi")]
#[command(about = "Import claude-mem observations and session summaries into OpenMemory")]
struct Cli {
    /// claude-mem database; defaults to ~/.claude-mem/claude-mem.db
    #[arg(long, env = "CLAUDE_MEM_DB")]
    db: Option<PathBuf>,

    /// Base URL of the OpenMemory service.
    #[arg(long, env = "OPENMEMORY_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Transform and count records without sending anything.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

impl Cli {
    fn into_config(self) -> Result<ImportConfig> {
        let source_db = match self.db {
            Some(path) => path,
            None => default_source_db()?,
        };
        let mut config = ImportConfig::new(source_db, self.url);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.dry_run = self.dry_run;
        Ok(config)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(io::stderr).try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let config = Cli::parse().into_config()?;
    tracing::debug!(?config, "resolved import configuration");

    println!("Opening claude-mem database: {}", config.source_db.display());
    let dry_run = config.dry_run;

    let mut progress = MarkerProgress::new(io::stdout());
    let report = Importer::new(config).run(&mut progress)?;

    if dry_run {
        println!("\n\nDry run, nothing was sent.");
    } else {
        println!();
    }
    println!("\nImport complete: {}", report.tally);
    Ok(())
}
