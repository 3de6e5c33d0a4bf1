mod elements;
pub use elements::*;

mod molecule;
pub use molecule::*;

mod parse;
pub use parse::*;

mod properties;
pub use properties::*;

mod graph;
pub use graph::*;

/// Install a global tracing subscriber at the given level ("trace",
/// "debug", "info", "warn", "error"). Safe to call more than once; later
/// calls are ignored.
pub fn init_logging(level: &str) {
    use tracing_subscriber::FmtSubscriber;

    let level = match level {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        _ => tracing::Level::ERROR,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
