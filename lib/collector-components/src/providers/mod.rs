//! Config providers.

mod file;
pub use self::file::FileConfigProvider;
