//! Process-level primitives for collector binaries.
//!
//! Everything a binary needs to set up before the check engine starts lives here, which for now means logging.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod logging;

/// Common imports.
pub mod prelude {
    pub use super::logging::{fatal_and_exit, initialize_logging, LoggingConfiguration, LoggingGuard};
}
