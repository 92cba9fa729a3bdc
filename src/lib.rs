pub mod analysis;
pub mod commands;
pub mod db;
pub mod error;
pub mod frames;
pub mod services;
pub mod settings;
mod utils;

use clap::Parser;

use commands::Cli;
use error::PipelineError;

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(commands::execute(cli)) {
        match err.downcast_ref::<PipelineError>() {
            Some(pipeline_err) => eprintln!("{}: {err:#}", pipeline_err.kind()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}
