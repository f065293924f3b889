use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter_for(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    })
}

/// Install a global formatter for the driving tool. Later calls are ignored.
pub fn init(verbosity: u8) {
    let formatter = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::uptime());
    let _ = tracing_subscriber::registry()
        .with(filter_for(verbosity))
        .with(formatter)
        .try_init();
}

/// Route engine logs through the test harness writer.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(1))
        .with_test_writer()
        .try_init();
}
