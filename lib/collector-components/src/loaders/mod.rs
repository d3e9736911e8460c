//! Check loaders.

mod native;
pub use self::native::{BuildFn, LoaderContext, NativeCheckLoader};
