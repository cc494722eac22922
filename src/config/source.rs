//! The source contract and the per-build context passed to lifecycle hooks.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::shape::KeySet;
use crate::{BoxError, ConfigError};

/// Caller-supplied data visible to every lifecycle listener of one build.
pub type SharedData = Map<String, Value>;

/// The lifecycle phases broadcast to sources during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    BuildStart,
    BuildSuccess,
    BuildError,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::BuildStart => "on_build_start",
            Lifecycle::BuildSuccess => "on_build_success",
            Lifecycle::BuildError => "on_build_error",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a build function.
///
/// Zero-sized build functions (fn items and closures capturing nothing) are
/// identified by their type, so repeated builds with one of them share a
/// `BuildFnRef`. A closure capturing state gets a fresh identity on every build,
/// since two closures of the same type may describe different shapes. The
/// identity only holds within one process; sources that persist data across
/// restarts must key on something the caller controls (see [`SharedData`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildFnRef(Identity);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Type(TypeId),
    Instance(u64),
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

impl BuildFnRef {
    /// Identity of the type `F`, regardless of its size.
    pub fn of<F: 'static>() -> Self {
        BuildFnRef(Identity::Type(TypeId::of::<F>()))
    }

    /// Identity of the build function `build_fn`.
    pub fn of_fn<F: 'static>(_build_fn: &F) -> Self {
        if mem::size_of::<F>() == 0 {
            Self::of::<F>()
        } else {
            Self::unique()
        }
    }

    /// An identity equal to no other.
    pub fn unique() -> Self {
        BuildFnRef(Identity::Instance(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)))
    }
}

/// Per-build context handed to every lifecycle listener.
#[derive(Debug, Clone)]
pub struct BuildContext {
    build_fn: BuildFnRef,
    shared_data: Arc<SharedData>,
}

impl BuildContext {
    pub fn new(build_fn: BuildFnRef, shared_data: SharedData) -> Self {
        Self {
            build_fn,
            shared_data: Arc::new(shared_data),
        }
    }

    pub fn build_fn(&self) -> BuildFnRef {
        self.build_fn
    }

    pub fn shared_data(&self) -> &SharedData {
        &self.shared_data
    }
}

/// Arguments of [`ConfigSource::on_build_start`].
#[derive(Debug, Clone, Copy)]
pub struct BuildStart<'a> {
    pub required_keys: &'a KeySet,
    pub optional_keys: &'a KeySet,
    pub context: &'a BuildContext,
}

/// Arguments of [`ConfigSource::on_build_success`].
#[derive(Debug, Clone, Copy)]
pub struct BuildSuccess<'a> {
    pub config: &'a Value,
    /// Every key that satisfied a placeholder, with its formatted value.
    pub key_values: &'a Map<String, Value>,
    pub context: &'a BuildContext,
}

/// Arguments of [`ConfigSource::on_build_error`].
#[derive(Debug, Clone, Copy)]
pub struct BuildFailure<'a> {
    pub error: &'a ConfigError,
    pub context: &'a BuildContext,
}

/// A provider of configuration values.
///
/// Sources answer one key at a time: `Ok(None)` means the source does not know
/// the key, an error means it failed while looking. Before every build the
/// builder calls [`clone_source`](ConfigSource::clone_source) on each source and
/// works on the clones, so per-build state never leaks between builds.
///
/// Lifecycle hooks are optional. A source opts in to a phase by returning
/// `true` from [`listens_to`](ConfigSource::listens_to) for it; hooks of phases
/// it does not listen to are never called.
#[async_trait]
pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Name reported in [`ConfigError::ResolveValue`].
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<Self>()))
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError>;

    /// Returns a fresh instance with the same configuration but no per-build state.
    fn clone_source(&self) -> Box<dyn ConfigSource>;

    fn listens_to(&self, _lifecycle: Lifecycle) -> bool {
        false
    }

    async fn on_build_start(&mut self, _event: BuildStart<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_build_success(&mut self, _event: BuildSuccess<'_>) -> Result<(), BoxError> {
        Ok(())
    }

    async fn on_build_error(&mut self, _event: BuildFailure<'_>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Strips module paths and generic arguments from a type name.
pub(crate) fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
