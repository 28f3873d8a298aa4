//! Lectern - classroom coordination client
//!
//! Joins a room relay (or hosts one) and drives lecture mode, focus
//! sharing, the presenter workflow and attendance from the console.

use std::path::PathBuf;

use lectern_core::config::default_config_path;
use lectern_core::{ClassroomConfig, PresentationStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod capture;
mod commands;
mod console;
mod error;
mod session;
mod timers;

fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting Lectern");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async move {
        // observers are created before the connection and outlive it
        let store = PresentationStore::new();
        let banner = session::spawn_presentation_banner(store.subscribe());

        let result = match session::Session::open(config, store).await {
            Ok(session) => session.run().await,
            Err(e) => Err(e),
        };
        banner.abort();
        result
    });

    if let Err(e) = result {
        tracing::error!("Session ended with error: {}", e);
        std::process::exit(1);
    }
}

/// Config path is the first argument, else the per-user default
fn load_config() -> lectern_core::Result<ClassroomConfig> {
    let path = match std::env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => default_config_path()?,
    };
    tracing::debug!(path = %path.display(), "Loading config");
    ClassroomConfig::load(&path)
}
