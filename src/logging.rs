/// Conditional logging module for development builds
///
/// The `log!` macro provides verbose diagnostic logging that is compiled out
/// in production (release) builds by default. Errors and warnings should continue
/// using `tracing::warn!` and `tracing::error!` directly.
///
/// Logging is enabled when either:
/// - Building in debug mode (`cfg(debug_assertions)`)
/// - The `console_logging` feature is explicitly enabled
///
/// # Examples
///
/// ```rust,ignore
/// use segment_graph::logging::log;
///
/// let rails = 12;
/// log!("Mapped segment over {} rails", rails);
/// ```
/// Conditionally log at debug level in development builds
///
/// This macro expands to `tracing::debug!` in debug builds or when
/// the `console_logging` feature is enabled. In production release builds,
/// it compiles to nothing (zero overhead).
#[macro_export]
macro_rules! log {
    ($($arg:tt)+) => {
        #[cfg(any(debug_assertions, feature = "console_logging"))]
        {
            ::tracing::debug!($($arg)+);
        }
    };
}

pub use crate::log;
