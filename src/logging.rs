use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the fmt subscriber. `RUST_LOG` wins when set; otherwise
/// `--verbose` selects debug output for this crate and warnings are shown
/// either way.
pub fn init(verbose: bool) -> Result<()> {
    let fallback = if verbose {
        "vibetrans=debug,info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
