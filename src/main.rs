mod cli;

use anyhow::Result;
use clap::{error::ErrorKind, Parser};
use cli::Cli;
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use std::{io, process::ExitCode};
use txload::{
    config::{ConfigLoader, HarnessConfig},
    execute, ExitStatus, MemStore, Orchestrator,
};

const CONFIG_SCOPE: &str = "txload";

fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    ExitCode::from(run().code())
}

fn run() -> ExitStatus {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                return ExitStatus::Usage;
            }
        },
    };

    let (readers, writers) = match cli.counts() {
        Some(counts) => counts,
        None => {
            eprintln!("usage: txload <store> <readers> <writers>");
            return ExitStatus::Usage;
        }
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}", err);
            return ExitStatus::Usage;
        }
    };

    info!("{:?}", config);

    let store = match MemStore::attach(&cli.store, config.store_size) {
        Ok(store) => store,
        Err(err) => {
            error!("Failed to attach to store `{}`: {}", cli.store, err);
            return ExitStatus::StoreUnavailable;
        }
    };

    let orchestrator = Orchestrator::new(config);
    let (status, _) = execute(
        &orchestrator,
        store,
        readers,
        writers,
        || {
            MemStore::delete(&cli.store);
        },
        &mut io::stdout(),
    );

    status
}

fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let loader = ConfigLoader::new(cli.config.as_deref(), CONFIG_SCOPE)?;
    loader.load()
}
