pub mod allowlist;
pub mod app;
pub mod artwork;
pub mod cache;
pub mod config;
pub mod entries;
pub mod group;
pub mod keys;
pub mod posters;
pub mod record;
pub mod slots;
pub mod store;
pub mod transform;

pub use entries::{Counts, Entry, OutputDocument};
pub use transform::{transform, transform_str, transform_with, TransformOptions};
