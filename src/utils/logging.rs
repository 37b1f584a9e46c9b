//! Conditional logging macros gated on a module-level `ENABLE_LOGS` const.
//!
//! Modules that use them declare the flag once:
//! ```text
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_error, log_info, log_warn};
//! ```

/// Info-level logging, skipped when the module's `ENABLE_LOGS` is false.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

