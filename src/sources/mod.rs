//! Property source implementations.

mod env;
mod file;
mod flatten;
mod map;
mod property_source;

pub use env::EnvSource;
pub use file::FileSource;
pub use map::MapSource;
pub use property_source::{ORDINAL_KEY, PropertySource};
