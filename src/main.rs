use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tokio::time::{interval, Duration};

use pixledger::audit::OpContext;
use pixledger::balance_ledger::BalanceLedger;
use pixledger::configure::load_config;
use pixledger::logger::setup_logger;
use pixledger::reconciler::ConsistencyAuditor;
use pixledger::split_engine::SplitDistributionEngine;
use pixledger::store::GatewayStore;

const SCAN_INTERVAL_SECS: u64 = 60;

#[derive(Parser)]
#[command(name = "pixledgerd", about = "PIX ledger background jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic consistency audit and split reprocessing loop
    Serve,
    /// One-shot balance consistency audit (report only, never fixes)
    Audit,
    /// One-shot retry of failed split executions
    ReprocessSplits,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = load_config()?;
    setup_logger(&config)?;

    let store = Arc::new(GatewayStore::open(&config.data_dir)?);
    let ledger = Arc::new(BalanceLedger::new(store.clone()));
    let auditor = ConsistencyAuditor::new(store.clone());
    let splits = SplitDistributionEngine::new(store.clone(), ledger);

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => {
            log::info!("pixledgerd scanner started (interval {}s)", SCAN_INTERVAL_SECS);
            let mut ticker = interval(Duration::from_secs(SCAN_INTERVAL_SECS));
            loop {
                ticker.tick().await;

                match auditor.scan_all() {
                    Ok(stats) => {
                        if stats.divergent > 0 {
                            log::warn!(
                                "Consistency audit: {} of {} accounts divergent",
                                stats.divergent,
                                stats.checked
                            );
                        } else {
                            log::debug!("Consistency audit: {} accounts clean", stats.checked);
                        }
                    }
                    Err(e) => log::error!("Consistency audit failed: {}", e),
                }

                let ctx = OpContext::system("scanner_reprocess_splits");
                match splits.reprocess_failed(&ctx) {
                    Ok(stats) if stats.scanned > 0 => {
                        log::info!(
                            "Split reprocess: {} scanned, {} recovered, {} still failed, {} skipped",
                            stats.scanned,
                            stats.reprocessed,
                            stats.still_failed,
                            stats.skipped
                        );
                    }
                    Ok(_) => {}
                    Err(e) => log::error!("Split reprocess failed: {}", e),
                }
            }
        }
        Command::Audit => {
            let stats = auditor.scan_all()?;
            println!(
                "Checked {} accounts, {} divergent",
                stats.checked, stats.divergent
            );
        }
        Command::ReprocessSplits => {
            let ctx = OpContext::system("cli_reprocess_splits");
            let stats = splits.reprocess_failed(&ctx)?;
            println!(
                "Scanned {} failed executions: {} recovered, {} still failed, {} skipped",
                stats.scanned, stats.reprocessed, stats.still_failed, stats.skipped
            );
        }
    }

    Ok(())
}
