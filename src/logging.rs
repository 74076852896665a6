//! Explicit logger handles.
//!
//! Components such as [`RootModule`](crate::rootmodule::RootModule) and
//! [`SchemaStorage`](crate::schema::SchemaStorage) never rely on a process-wide
//! default logger. Each one receives a [`Logger`] at construction time and emits its
//! `tracing` events through it. A [`Logger::discard`] handle drops everything,
//! [`Logger::current`] forwards to whatever subscriber is installed on the calling
//! thread when the handle is created (usually the one set up by the CLI).
//!
//! # Example
//!
//! ```rust,no_run
//! use tfroot::logging::Logger;
//!
//! let logger = Logger::current();
//! logger.scope(|| tracing::info!(target: "rootmodule", "loading started"));
//! ```

use std::fmt;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// A cloneable handle to the subscriber a component logs into.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// A logger that discards every event.
    pub fn discard() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// A logger forwarding to the subscriber active on the current thread.
    pub fn current() -> Self {
        Self {
            dispatch: tracing::dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Wrap an explicit dispatcher, e.g. one built for a single test.
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self {
            dispatch,
        }
    }

    /// Run `f` with this logger's subscriber as the thread default.
    ///
    /// Events emitted inside `f` go to this logger only. `f` must not await.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Returns true if this handle drops all events.
    pub fn is_discard(&self) -> bool {
        self.dispatch.is::<tracing::subscriber::NoSubscriber>()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::discard()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("discard", &self.is_discard()).finish()
    }
}

/// Install the process-wide subscriber used by the CLI.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Output goes to
/// stderr so command output on stdout stays machine readable. Calling this twice is
/// harmless.
pub fn init_logging(default_filter: &str) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(default_filter)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(std::env::var_os("NO_COLOR").is_none())
        .try_init();
}
