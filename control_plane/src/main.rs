#![warn(
    clippy::pedantic,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod cli;

use clap::Parser;
use cli::Cli;
use ingress_controller::controllers::{
    ConfigSink, DeduplicatedConfigs, DeduplicatedStatuses, FileConfigSink, FileStatusSink,
    LogStatusSink, SpawnControllersError, SpawnControllersParams, StatusSink, spawn_controllers,
};
use ingress_controller::options::Options;
use ingress_core::instrumentation::init_instrumentation;
use ingress_core::task::Builder as TaskBuilder;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum MainError {
    #[error("Failed to create output directory {0}: {1}")]
    OutputDirectory(String, #[source] std::io::Error),
    #[error("Failed to spawn controllers: {0}")]
    SpawnControllers(#[from] SpawnControllersError),
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), MainError> {
    let args = Cli::parse();
    let options = Arc::new(Options::default());

    init_instrumentation();

    tokio::fs::create_dir_all(args.output())
        .await
        .map_err(|err| MainError::OutputDirectory(args.output().display().to_string(), err))
        .inspect_err(|err| error!("{}", err))?;

    let status_sink: Arc<dyn StatusSink> = match args.status_file() {
        Some(path) => Arc::new(DeduplicatedStatuses::new(FileStatusSink::new(path))),
        None => Arc::new(DeduplicatedStatuses::new(LogStatusSink)),
    };
    let config_sink: Arc<dyn ConfigSink> =
        Arc::new(DeduplicatedConfigs::new(FileConfigSink::new(args.output())));

    let task_builder = TaskBuilder::default();

    {
        let params = SpawnControllersParams::builder()
            .options(options)
            .manifests_path(args.manifests())
            .settings_path(args.settings().clone())
            .status_sink(status_sink)
            .config_sink(config_sink)
            .build();

        spawn_controllers(&task_builder, params)
            .inspect_err(|err| error!("Failed to spawn controllers: {}", err))?;
    }

    task_builder.join_all().await;

    Ok(())
}
