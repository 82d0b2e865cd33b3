pub mod analysis;
pub mod config;
pub mod error;
pub mod files;
pub mod load;
pub mod stats;

pub use error::{Error, Result};
pub use files::{file_dict, FileInfo, FileTree, InfoMode};
pub use load::{load_csv, CsvFile, Loader};

/// Serializes tests that set `PARENTLAB_RESOURCES`.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parentlab=debug")),
        )
        .with_test_writer()
        .finish();
    // already set by another test
    let _ = tracing::subscriber::set_global_default(subscriber);
}
