//! Optional `tracing-subscriber` wiring, gated behind the `logging-init`
//! feature so embedding applications that already configure their own
//! subscriber never get a second one forced on them.

#[cfg(feature = "logging-init")]
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
