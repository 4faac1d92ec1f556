//! Tracing setup for hosts without their own subscriber

use tracing::Level;

/// Install a `tracing-subscriber` fmt subscriber at `level`
///
/// Returns `false` if a global subscriber was already installed, in which case
/// the existing one is kept.
pub fn init_tracing(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}
