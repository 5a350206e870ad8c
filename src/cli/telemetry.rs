use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::cli::commands::logging;

/// Install the global subscriber. `RUST_LOG` overrides the verbosity level.
///
/// # Errors
/// Returns an error if a directive is invalid or a subscriber is already set.
pub fn init(options: logging::Options) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(options.level.unwrap_or(Level::ERROR).into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?);

    if options.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true);
        tracing::subscriber::set_global_default(Registry::default().with(fmt_layer).with(filter))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_target(false)
            .pretty();
        tracing::subscriber::set_global_default(Registry::default().with(fmt_layer).with(filter))?;
    }

    Ok(())
}
