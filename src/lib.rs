// src/lib.rs
use tracing_subscriber::EnvFilter;

pub mod artifacts;
pub mod client;
pub mod config;
pub mod deploy;
pub mod distribution;
pub mod error;
pub mod plan;
pub mod plans;
pub mod registry;
pub mod utils;

#[cfg(test)]
mod testing;

/// Installs the stderr log subscriber shared by the binaries.
///
/// Report lines go to stdout, so diagnostics never interleave with them
/// when output is piped.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "cod_deploy=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
