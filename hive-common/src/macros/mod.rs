// hive_common/src/macros/mod.rs
//
// Logging macros that forward to `Logger::*_args` behind a level check, so the
// message is only formatted when the level is enabled.

#[doc(hidden)]
pub use log as __log;

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {{
        if $crate::macros::__log::log_enabled!($crate::macros::__log::Level::Debug) {
            ($logger).debug_args(format_args!($($arg)*));
        }
    }}
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {{
        if $crate::macros::__log::log_enabled!($crate::macros::__log::Level::Info) {
            ($logger).info_args(format_args!($($arg)*));
        }
    }}
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {{
        if $crate::macros::__log::log_enabled!($crate::macros::__log::Level::Warn) {
            ($logger).warn_args(format_args!($($arg)*));
        }
    }}
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {{
        if $crate::macros::__log::log_enabled!($crate::macros::__log::Level::Error) {
            ($logger).error_args(format_args!($($arg)*));
        }
    }}
}
