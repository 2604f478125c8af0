//! Runtime-reconfigurable tracing initialization. `/v1/config/engine`'s
//! `log_level` field drives the [`LogReloadHandle`] this returns.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub type LogReloadHandle = reload::Handle<EnvFilter, Registry>;

/// Installs a `tracing` subscriber with an `EnvFilter` wrapped in a reload
/// layer. `RUST_LOG`, if set, wins over `default_level`.
pub fn init_tracing(default_level: &str) -> LogReloadHandle {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let (filter_layer, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();
    handle
}
