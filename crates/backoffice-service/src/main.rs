//! Main entry point for the backoffice service.
//!
//! Loads the configuration, builds the engine over the configured storage
//! backend, creates the bootstrap administrator if one is configured and
//! serves the HTTP API.

use backoffice_config::Config;
use backoffice_core::{BackofficeEngine, EngineBuilder};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

use backoffice_storage::implementations::file::create_storage as create_file_storage;
use backoffice_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the backoffice service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml", env = "BACKOFFICE_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = Arc::new(build_engine(config.clone()).await?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => server::start_server(api_config, engine).await?,
		None => tracing::warn!("API server disabled; nothing to serve"),
	}

	tracing::info!("Stopped backoffice");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the engine with the available storage backends.
async fn build_engine(config: Config) -> Result<BackofficeEngine, Box<dyn std::error::Error>> {
	let storage_factories = create_factory_map!(
		backoffice_storage::StorageInterface,
		backoffice_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	Ok(EngineBuilder::new(config).build(&storage_factories).await?)
}
