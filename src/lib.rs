//! Resolve a declarative configuration shape against an ordered list of sources.
//!
//! A build function describes the configuration as a tree of literals and
//! placeholders created with [`ShapeBuilder::required`] and
//! [`ShapeBuilder::optional`]. [`ConfigBuilder`] asks its sources for every
//! referenced key, first source first, substitutes the answers into the tree and
//! reports every missing required key at once.
//!
//! Reference sources live in [`sources`], value formatters in [`format`].

pub mod config;
mod error;
pub mod format;
pub mod sources;

pub use config::{
    BuildContext, BuildFnRef, ConfigBuilder, ConfigSource, KeySet, Lifecycle, Placeholder, Shape,
    ShapeBuilder, SharedData,
};
pub use error::{BoxError, ConfigError};
