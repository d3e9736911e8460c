//! Error primitives shared across the collector crates.
//!
//! Seams with a well-known set of failure modes (config providers, check loaders, configuration) define their own
//! `snafu`-based error enums. Everything else, mostly application glue and check implementations, uses
//! [`GenericError`], which can wrap any error while keeping its cause chain.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::Display;

/// An opaque error that can wrap any other error type.
pub type GenericError = anyhow::Error;

#[doc(hidden)]
pub use anyhow::anyhow as _anyhow;

/// Creates a [`GenericError`].
///
/// Accepts a string literal, a format string with arguments (same rules as `std::format!`), or any value implementing
/// `Debug` and `Display`. When given an existing `std::error::Error`, its source chain is preserved.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::_anyhow!($fmt, $($arg)*) };
}

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods for attaching context to fallible results.
///
/// This mirrors `anyhow::Context`, under a name that does not collide with `snafu::ResultExt` when both are imported.
pub trait ErrorContext<T, E>: sealed::Sealed {
    /// Wraps the error, if any, with the given context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error, if any, with context that is only built when an error actually occurred.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        anyhow::Context::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        anyhow::Context::with_context(self, f)
    }
}
