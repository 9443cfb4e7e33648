use std::fs::File;

use anyhow::{Result, anyhow};
use clap::Parser;
use daemonize::Daemonize;
use log::LevelFilter;
use syslog::{BasicLogger, Facility, Formatter3164};

use statuslined::{application::Application, cli::Cli, config::ConfigManager};

fn init_syslog() -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: "statuslined".into(),
        pid: 0,
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|_| log::set_max_level(LevelFilter::Info))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create("/var/tmp/statuslined.log")
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Forking must happen before the runtime exists, so daemonization is
    // done here and the async entry point is started afterwards.
    if cli.daemonize {
        init_syslog().and(into_daemon())?;
    } else {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Info)
            .parse_default_env()
            .init();
    }

    let config_manager = ConfigManager::load(cli.config)?;

    run(config_manager)
}

#[tokio::main]
async fn run(config_manager: ConfigManager) -> Result<()> {
    Application::builder()
        .with_config_manager(config_manager)
        .build()?
        .run()
        .await
}
