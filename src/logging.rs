//! Process-wide `tracing` subscriber.
//!
//! Logs go to stderr at `INFO` unless `RUST_LOG` says otherwise. Calling
//! [`init`] more than once is harmless.

use std::io::IsTerminal;

use once_cell::sync::OnceCell;
use tracing_subscriber::{filter::LevelFilter, fmt, util::SubscriberInitExt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

pub fn init() {
    INITIALIZED.get_or_init(setup_logging);
}

fn setup_logging() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .finish()
        .try_init();
}
