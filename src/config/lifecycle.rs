//! Sequential dispatch of lifecycle hooks to the sources that listen for them.

use serde_json::{Map, Value};
use tracing::trace;

use super::shape::KeySet;
use super::source::{BuildContext, BuildFailure, BuildStart, BuildSuccess, ConfigSource, Lifecycle};
use crate::ConfigError;

/// Indices of the sources listening to each lifecycle phase, in registration order.
#[derive(Debug, Clone, Default)]
pub(crate) struct LifecycleListeners {
    build_start: Vec<usize>,
    build_success: Vec<usize>,
    build_error: Vec<usize>,
}

impl LifecycleListeners {
    pub(crate) fn scan(sources: &[Box<dyn ConfigSource>]) -> Self {
        let listening = |lifecycle: Lifecycle| -> Vec<usize> {
            sources
                .iter()
                .enumerate()
                .filter(|(_, source)| source.listens_to(lifecycle))
                .map(|(index, _)| index)
                .collect()
        };

        Self {
            build_start: listening(Lifecycle::BuildStart),
            build_success: listening(Lifecycle::BuildSuccess),
            build_error: listening(Lifecycle::BuildError),
        }
    }

    pub(crate) fn count(&self, lifecycle: Lifecycle) -> usize {
        self.indices(lifecycle).len()
    }

    fn indices(&self, lifecycle: Lifecycle) -> &[usize] {
        match lifecycle {
            Lifecycle::BuildStart => &self.build_start,
            Lifecycle::BuildSuccess => &self.build_success,
            Lifecycle::BuildError => &self.build_error,
        }
    }

    pub(crate) async fn run_build_start(
        &self,
        sources: &mut [Box<dyn ConfigSource>],
        required_keys: &KeySet,
        optional_keys: &KeySet,
        context: &BuildContext,
    ) -> Result<(), ConfigError> {
        let event = BuildStart {
            required_keys,
            optional_keys,
            context,
        };
        for &index in &self.build_start {
            let source = &mut sources[index];
            trace!(source = %source.name(), index, "running on_build_start listener");
            source
                .on_build_start(event)
                .await
                .map_err(|e| lifecycle_error(Lifecycle::BuildStart, e))?;
        }
        Ok(())
    }

    pub(crate) async fn run_build_success(
        &self,
        sources: &mut [Box<dyn ConfigSource>],
        config: &Value,
        key_values: &Map<String, Value>,
        context: &BuildContext,
    ) -> Result<(), ConfigError> {
        let event = BuildSuccess {
            config,
            key_values,
            context,
        };
        for &index in &self.build_success {
            let source = &mut sources[index];
            trace!(source = %source.name(), index, "running on_build_success listener");
            source
                .on_build_success(event)
                .await
                .map_err(|e| lifecycle_error(Lifecycle::BuildSuccess, e))?;
        }
        Ok(())
    }

    pub(crate) async fn run_build_error(
        &self,
        sources: &mut [Box<dyn ConfigSource>],
        error: &ConfigError,
        context: &BuildContext,
    ) -> Result<(), ConfigError> {
        let event = BuildFailure { error, context };
        for &index in &self.build_error {
            let source = &mut sources[index];
            trace!(source = %source.name(), index, "running on_build_error listener");
            source
                .on_build_error(event)
                .await
                .map_err(|e| lifecycle_error(Lifecycle::BuildError, e))?;
        }
        Ok(())
    }
}

fn lifecycle_error(lifecycle: Lifecycle, source: crate::BoxError) -> ConfigError {
    ConfigError::Lifecycle { lifecycle, source }
}
