use color_eyre::eyre::Report;
use tracing_error::ErrorLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Installs color-eyre and the global tracing subscriber.
///
/// The filter is read from `RUST_LOG` and falls back to `info`.
pub fn setup() -> Result<(), Report> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default()
        .with(filter)
        .with(ErrorLayer::default())
        .with(fmt::Layer::default());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
