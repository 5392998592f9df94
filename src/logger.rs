use tracing_subscriber::EnvFilter;

pub const ENV_VAR: &str = "TT_LOG";

/// Log targets, one per stage of a run.
pub const CLI: &str = "tt::cli";
pub const PROCESSOR: &str = "tt::processor";
pub const RUNNER: &str = "tt::runner";

pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .without_time()
        .try_init();
}
