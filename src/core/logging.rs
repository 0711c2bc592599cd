use env_logger::Env;

/// Logs go to stderr so stdout carries only frame output. `RUST_LOG` overrides the default.
pub fn init_logging() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}
