use clap::Parser;
use scope_controller::cli::Cli;
use scope_controller::logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format, &cli.log_level);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("configure failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match scope_controller::run(config).await {
        Ok(report) => {
            info!(
                "Worker {} stopped by {} ({})",
                report.worker_pid, report.source, report.exit
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(step = e.step(), "{} failed: {}", e.step(), e);
            ExitCode::FAILURE
        }
    }
}
