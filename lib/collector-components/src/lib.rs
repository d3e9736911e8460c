//! Concrete config providers and check loaders for the collector.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod loaders;
pub mod providers;
