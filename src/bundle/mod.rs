pub mod cache;

pub use cache::{BundleCache, BundleError};
