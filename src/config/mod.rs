//! Configuration building: shapes, sources and the builder that ties them together.

mod builder;
mod lifecycle;
mod resolve;
mod shape;
mod source;
mod substitute;

pub use builder::ConfigBuilder;
pub use resolve::resolve_keys;
pub use shape::{Formatter, KeySet, Keys, Placeholder, Shape, ShapeBuilder};
pub use source::{
    BuildContext, BuildFailure, BuildFnRef, BuildStart, BuildSuccess, ConfigSource, Lifecycle,
    SharedData,
};
pub use substitute::{substitute, Substitution};
