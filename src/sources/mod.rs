//! Reference [`ConfigSource`](crate::ConfigSource) implementations.

pub mod cache;
mod env;
mod file;
mod json;
mod lookup;
mod memory;
pub mod remote;

pub use cache::{CacheEnabled, CacheService, CacheSource, CacheSourceOptions, FileCache, MemoryCache};
pub use env::{default_key_transform, EnvCacheMode, EnvSource, EnvSourceOptions, KeyTransform};
pub use file::{load_config_file, FileError, FileFormat};
pub use json::{JsonSource, JsonSourceError};
pub use lookup::{default_lookup, get_path, LookupFn};
pub use memory::{FnSource, MemorySource};
pub use remote::{RemoteSource, RemoteSourceOptions};
