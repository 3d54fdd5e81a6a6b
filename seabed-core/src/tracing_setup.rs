//! Tracing setup for Seabed.
//!
//! The library itself only emits events; embedding binaries and test
//! harnesses call in here to install a subscriber. `RUST_LOG` overrides the
//! default filter when set.

use tracing_subscriber::EnvFilter;

/// Initializes a console subscriber with the given default filter.
///
/// The environment (`RUST_LOG`) wins over `default_filter` when present.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If a global subscriber is already installed
pub fn init_tracing(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()?;

    Ok(())
}
