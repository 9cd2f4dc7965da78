use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{error, info};

use audit_ledger::audit::{IntegrityCheckResult, VerifyOptions};
use audit_ledger::{AuditConfig, AuditLoggingSystem};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("verify-audit-chain")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify the integrity of stored audit chains")
        .arg(
            Arg::new("storage-dir")
                .short('s')
                .long("storage-dir")
                .value_name("PATH")
                .help("Audit storage directory (overrides configuration)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("category")
                .long("category")
                .value_name("ID")
                .help("Verify only this category"),
        )
        .arg(
            Arg::new("deep")
                .short('d')
                .long("deep")
                .action(ArgAction::SetTrue)
                .help("Recompute Merkle roots of unencrypted blocks"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    // Set log level based on flags
    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let mut config = AuditConfig::load(config_path.as_deref())?;
    if let Some(dir) = matches.get_one::<String>("storage-dir") {
        config.storage_dir = PathBuf::from(dir);
    }

    let options = VerifyOptions {
        deep: matches.get_flag("deep"),
    };

    info!("Verifying audit chains in {:?}", config.storage_dir);
    let system = AuditLoggingSystem::open(config)?;

    let results: Vec<IntegrityCheckResult> = match matches.get_one::<String>("category") {
        Some(category) => vec![system.verify_integrity(category, options).await?],
        None => system.verify_all(options).await,
    };

    let mut failed = 0;
    for result in &results {
        if !result.valid {
            failed += 1;
        }
        if verbose || !result.valid {
            println!("{}", result.detailed_status());
        } else if !quiet {
            println!("{}", result.summary());
        }
    }

    if failed > 0 {
        error!("{} of {} chains failed verification", failed, results.len());
        std::process::exit(1);
    }

    if !quiet {
        println!("✓ {} audit chains verified", results.len());
    }

    Ok(())
}
