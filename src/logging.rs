use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize tracing output for binaries and tests embedding the driver.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,flir_one_driver=debug"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        info!("📊 logging initialized");
    }
}
