//! The configuration builder and its per-build protocol.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use super::lifecycle::LifecycleListeners;
use super::resolve::resolve_keys;
use super::shape::{Shape, ShapeBuilder};
use super::source::{BuildContext, BuildFnRef, ConfigSource, Lifecycle, SharedData};
use super::substitute::substitute;
use crate::{BoxError, ConfigError};

/// Resolves build shapes against an ordered list of sources.
///
/// Sources are queried in list order for every key and the first one that
/// knows a key provides its value. Each call to [`build`](Self::build) works on
/// fresh clones of the sources, so one builder can serve any number of shapes,
/// sequentially or concurrently, without builds observing each other's state.
///
/// ## Example
///
/// ```no_run
/// use config_shape::sources::EnvSource;
/// use config_shape::format::as_list;
/// use config_shape::{ConfigBuilder, Shape};
///
/// # async fn run() -> Result<(), config_shape::ConfigError> {
/// let builder = ConfigBuilder::new(vec![Box::new(EnvSource::new())])?;
///
/// let config = builder
///     .build(|b| {
///         Ok(Shape::object([
///             ("user", Shape::from(b.required("USER"))),
///             ("paths", b.required("PATH").format(as_list(Default::default())).into()),
///             ("arch", b.optional("ARCH").default_value("x86_64").into()),
///             ("retries", Shape::literal(3)),
///         ]))
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
    listeners: LifecycleListeners,
}

impl ConfigBuilder {
    /// Creates a builder from sources in priority order.
    ///
    /// Fails with [`ConfigError::NoSources`] if `sources` is empty.
    pub fn new(sources: Vec<Box<dyn ConfigSource>>) -> Result<Self, ConfigError> {
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }

        let listeners = LifecycleListeners::scan(&sources);
        Ok(Self { sources, listeners })
    }

    pub fn sources(&self) -> &[Box<dyn ConfigSource>] {
        &self.sources
    }

    /// Builds the configuration described by `build_fn`.
    pub async fn build<F>(&self, build_fn: F) -> Result<Value, ConfigError>
    where
        F: FnOnce(&mut ShapeBuilder) -> Result<Shape, BoxError> + Send + 'static,
    {
        self.build_with(build_fn, SharedData::new()).await
    }

    /// Builds the configuration described by `build_fn`, exposing `shared_data`
    /// to every lifecycle listener.
    pub async fn build_with<F>(&self, build_fn: F, shared_data: SharedData) -> Result<Value, ConfigError>
    where
        F: FnOnce(&mut ShapeBuilder) -> Result<Shape, BoxError> + Send + 'static,
    {
        let context = BuildContext::new(BuildFnRef::of_fn(&build_fn), shared_data);
        self.fork().build_self(build_fn, context).await
    }

    /// Builds and deserializes the configuration into `T`.
    ///
    /// Deserialization happens after the build succeeded, so lifecycle
    /// listeners see the build as successful even if it fails.
    pub async fn build_typed<T, F>(&self, build_fn: F) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        F: FnOnce(&mut ShapeBuilder) -> Result<Shape, BoxError> + Send + 'static,
    {
        self.build_typed_with(build_fn, SharedData::new()).await
    }

    pub async fn build_typed_with<T, F>(&self, build_fn: F, shared_data: SharedData) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        F: FnOnce(&mut ShapeBuilder) -> Result<Shape, BoxError> + Send + 'static,
    {
        let config = self.build_with(build_fn, shared_data).await?;
        serde_json::from_value(config).map_err(ConfigError::Deserialize)
    }

    /// A builder over fresh clones of every source, in the same order.
    fn fork(&self) -> ConfigBuilder {
        let sources: Vec<_> = self.sources.iter().map(|s| s.clone_source()).collect();
        let listeners = LifecycleListeners::scan(&sources);
        ConfigBuilder { sources, listeners }
    }

    async fn build_self<F>(mut self, build_fn: F, context: BuildContext) -> Result<Value, ConfigError>
    where
        F: FnOnce(&mut ShapeBuilder) -> Result<Shape, BoxError>,
    {
        debug!(
            sources = self.sources.len(),
            start_listeners = self.listeners.count(Lifecycle::BuildStart),
            "starting config build"
        );

        let (config, key_values) = match self.resolve(build_fn, &context).await {
            Ok(resolved) => resolved,
            Err(err) => {
                debug!(error = %err, "config build failed");
                self.listeners
                    .run_build_error(&mut self.sources, &err, &context)
                    .await?;
                return Err(err);
            }
        };

        self.listeners
            .run_build_success(&mut self.sources, &config, &key_values, &context)
            .await?;

        debug!(keys = key_values.len(), "config build succeeded");
        Ok(config)
    }

    /// Everything up to, but not including, the success/error lifecycle phase.
    async fn resolve<F>(
        &mut self,
        build_fn: F,
        context: &BuildContext,
    ) -> Result<(Value, Map<String, Value>), ConfigError>
    where
        F: FnOnce(&mut ShapeBuilder) -> Result<Shape, BoxError>,
    {
        let mut shape_builder = ShapeBuilder::new();
        let shape = build_fn(&mut shape_builder).map_err(ConfigError::BuildFunction)?;
        let (required_keys, optional_keys) = shape_builder.into_key_sets();

        debug!(
            required = required_keys.len(),
            optional = optional_keys.len(),
            "declared config keys"
        );

        self.listeners
            .run_build_start(&mut self.sources, &required_keys, &optional_keys, context)
            .await?;

        let all_keys = required_keys.union(&optional_keys);
        let key_values = resolve_keys(all_keys.iter(), &self.sources).await?;

        let substitution = substitute(shape, &key_values)?;
        if !substitution.missing_required.is_empty() {
            let keys = substitution.missing_required.into_vec();
            debug!(?keys, "required config keys are missing");
            return Err(ConfigError::MissingRequiredKeys { keys });
        }

        Ok((substitution.config, substitution.used))
    }
}
