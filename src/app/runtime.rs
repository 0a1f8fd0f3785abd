use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{debug, info, warn};

use loadtest_core::LoadTestOrchestrator;

use crate::ProcessExit;
use crate::app::{exit_handler, terminal};
use crate::app_config;
use crate::cli::Args;

pub(crate) async fn run_loadtest() -> Result<ProcessExit> {
    // Parse before tracing so --help prints without log noise.
    let args = Args::parse();

    let Some(mode) = args.mode() else {
        Args::command().print_help()?;
        println!();
        return Ok(ProcessExit::Failure);
    };

    let _log_guard = terminal::init_tracing(args.default_log_level(), args.log_file.as_deref())?;
    debug!(?args, "CLI arguments parsed");

    let file_config = app_config::load_file_config(args.config.as_deref())?;
    let config = app_config::resolve_config(&args, file_config.as_ref())?;
    info!(
        host = %config.host,
        front_end = config.use_front_end,
        concurrency = config.concurrency,
        retries = config.retries,
        "Load test starting"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        interrupted_signal.store(true, Ordering::SeqCst);
        warn!("Interrupt received. Waiting for in-flight requests; press Ctrl-C again to abort");
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Aborted");
            std::process::exit(i32::from(ProcessExit::Failure.code()));
        }
    });

    let mut orchestrator = LoadTestOrchestrator::from_config(config)
        .await
        .context("Failed to prepare load test")?
        .with_interrupt_flag(interrupted);

    let report = orchestrator.run(mode).await;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        println!("{report}");
    }

    Ok(exit_handler::determine_exit_outcome(report.outcome))
}
