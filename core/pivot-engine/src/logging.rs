//! FILENAME: core/pivot-engine/src/logging.rs
// PURPOSE: Category-tagged logging macros for the pivot engine.
// CONTEXT: Lines are routed through the `log` facade with the category as
// the target, so the host application decides where they end up.

// ============================================================================
// CATEGORY MACROS
// ============================================================================

macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        ::log::debug!(target: $cat, $($arg)*)
    };
}

macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        ::log::info!(target: $cat, $($arg)*)
    };
}

macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        ::log::warn!(target: $cat, $($arg)*)
    };
}

/// Function entry at trace level: `ENTER name params`.
macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        ::log::trace!(target: $cat, "ENTER {}", $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        ::log::trace!(target: $cat, "ENTER {} {}", $func, format!($($arg)*))
    };
}

/// Function exit at trace level: `EXIT name result`.
macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        ::log::trace!(target: $cat, "EXIT {}", $func)
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        ::log::trace!(target: $cat, "EXIT {} {}", $func, format!($($arg)*))
    };
}

pub(crate) use log_debug;
pub(crate) use log_enter;
pub(crate) use log_exit;
pub(crate) use log_info;
pub(crate) use log_warn;
