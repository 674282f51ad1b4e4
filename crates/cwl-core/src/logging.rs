//! Log subscriber setup

use crate::error::ConvertError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Install a global fmt subscriber filtered by `RUST_LOG`
///
/// Falls back to [`DEFAULT_FILTER`] when `RUST_LOG` is unset.
///
/// # Errors
/// `Logging` if a global subscriber is already installed
pub fn try_init() -> Result<(), ConvertError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .map_err(|e| ConvertError::Logging(format!("failed to create env filter: {e}")))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .try_init()
        .map_err(|e| ConvertError::Logging(format!("failed to initialize tracing: {e}")))
}
