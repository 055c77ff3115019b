//! wld - WiFi access-point/station control daemon
//!
//! Loads the configuration, creates the configured radios, access points and
//! endpoints, then runs the timer-driven commit loop until signalled.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wld::config::{WldConfig, DEFAULT_CONFIG_PATH};
use wld::daemon::WldDaemon;
use wld::secdmn::TokioSpawner;
use wld::topology::Topology;
use wld::vendor::NoopVendor;
use wld::WldContext;

/// WiFi control-plane daemon
#[derive(Parser, Debug)]
#[command(name = "wld")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Print the state snapshot after bootstrap and exit
    #[arg(long)]
    dump_state: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting wld ---");
    let config = WldConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let mut ctx = WldContext::new(config, Rc::new(TokioSpawner::new()));
    ctx.init();
    ctx.register_vendor(Rc::new(NoopVendor::default()))
        .context("registering generic vendor")?;
    Topology::apply(&mut ctx).context("applying topology")?;

    if args.dump_state {
        ctx.run_pending();
        let mut state = ctx.snapshot().context("building state snapshot")?;
        state["generated_at"] = chrono::Utc::now().to_rfc3339().into();
        println!("{}", serde_json::to_string_pretty(&state)?);
        ctx.shutdown();
        return Ok(());
    }

    let mut daemon = WldDaemon::new(ctx);
    daemon.run().await.context("event loop")?;

    info!("--- wld shutdown complete ---");
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();
}
