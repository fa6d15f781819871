//! Default definitions
//!
//! Ready-made definitions for the pieces most services share: a root
//! cancellation token, the configuration source, the parsed
//! [`ServiceConfig`] and a logger span. Their names come from
//! [`DefinitionKeys`], so two kits in one process never collide.

use crate::config::{ConfigError, ConfigService, ServiceConfig};
use crate::di::{Container, ContainerBuilder, Definition};
use crate::error::Result;
use crate::logging::init_logging;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Names of the default dependencies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefinitionKeys {
    pub base_context: String,
    pub config_source: String,
    pub config: String,
    pub logger: String,
}

impl DefinitionKeys {
    pub const DEFAULT_PREFIX: &'static str = "corekit_";

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            base_context: format!("{prefix}base_context"),
            config_source: format!("{prefix}config_source"),
            config: format!("{prefix}config"),
            logger: format!("{prefix}logger"),
        }
    }

    pub fn base_context(&self, container: &Container) -> Result<CancellationToken> {
        container
            .safe_get::<CancellationToken>(&self.base_context)
            .map(|token| (*token).clone())
    }

    pub fn config(&self, container: &Container) -> Result<Arc<ServiceConfig>> {
        container.safe_get::<ServiceConfig>(&self.config)
    }

    pub fn logger(&self, container: &Container) -> Result<Span> {
        container.safe_get::<Span>(&self.logger).map(|span| (*span).clone())
    }
}

impl Default for DefinitionKeys {
    fn default() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }
}

/// Root cancellation token, canceled when the container closes.
pub fn base_context_definition(keys: &DefinitionKeys) -> Definition {
    Definition::new(&keys.base_context)
        .build(|_| Ok(CancellationToken::new()))
        .close(|token: &CancellationToken| {
            token.cancel();
            Ok(())
        })
}

pub fn config_source_definition(keys: &DefinitionKeys, source: ConfigService) -> Definition {
    Definition::new(&keys.config_source).build(move |_| Ok(source.clone()))
}

/// [`ServiceConfig`] loaded from the config source with `env_prefix`.
pub fn config_definition(keys: &DefinitionKeys, env_prefix: impl Into<String>) -> Definition {
    let source_key = keys.config_source.clone();
    let env_prefix = env_prefix.into();

    Definition::new(&keys.config).build(move |container| {
        let source = container.safe_get::<ConfigService>(&source_key)?;
        Ok(ServiceConfig::load(&source, &env_prefix)?)
    })
}

/// Logger span tagged with the service name and version.
///
/// Building it installs the global subscriber, configured from
/// [`ServiceConfig`] when one is available. An already installed
/// subscriber is kept.
pub fn logger_definition(keys: &DefinitionKeys) -> Definition {
    let config_key = keys.config.clone();

    Definition::new(&keys.logger).build(move |container| {
        let config = container.safe_get::<ServiceConfig>(&config_key).ok();
        let logging = config
            .as_ref()
            .map(|config| config.logging.clone())
            .unwrap_or_default();

        match init_logging(&logging) {
            Ok(()) => {}
            Err(ConfigError::Logging(reason)) => {
                tracing::debug!(%reason, "Keeping the installed subscriber");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(match config {
            Some(config) => tracing::info_span!(
                "service",
                service_name = %config.name,
                service_version = %config.version
            ),
            None => tracing::info_span!("service"),
        })
    })
}

/// Builder holding all default definitions.
pub fn default_builder(
    keys: &DefinitionKeys,
    source: ConfigService,
    env_prefix: impl Into<String>,
) -> Result<ContainerBuilder> {
    let mut builder = ContainerBuilder::new();
    builder.add([
        base_context_definition(keys),
        config_source_definition(keys, source),
        config_definition(keys, env_prefix),
        logger_definition(keys),
    ])?;
    Ok(builder)
}
