use crate::di::{Container, Definition};
use crate::error::{RegistryError, Result};
use std::collections::HashSet;

/// Builder for constructing a dependency injection container
///
/// Definitions are checked as they are added; [`ContainerBuilder::build`]
/// then produces an independent container snapshot and eagerly builds every
/// non-lazy definition in it.
///
/// # Example
/// ```
/// use corekit::di::{ContainerBuilder, Definition};
///
/// let mut builder = ContainerBuilder::new();
/// builder
///     .add([
///         Definition::new("port").build(|_| Ok(8080u16)),
///         Definition::new("addr").lazy().build(|c| {
///             let port = c.safe_get::<u16>("port")?;
///             Ok(format!("0.0.0.0:{port}"))
///         }),
///     ])
///     .unwrap();
///
/// let container = builder.build().unwrap();
/// assert!(container.is_built("port"));
/// assert_eq!(*container.get::<String>("addr"), "0.0.0.0:8080");
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    definitions: Vec<Definition>,
    names: HashSet<String>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers definitions in order, stopping at the first rejected one.
    ///
    /// A definition is rejected when its name is empty or taken, when it is
    /// eager and has no build function, or when its validate hook fails.
    /// The hook sees a container holding only the definitions added so far.
    pub fn add(&mut self, definitions: impl IntoIterator<Item = Definition>) -> Result<()> {
        for def in definitions {
            self.add_one(def)?;
        }
        Ok(())
    }

    fn add_one(&mut self, def: Definition) -> Result<()> {
        def.check_registrable()?;

        if self.names.contains(def.name()) {
            return Err(RegistryError::DefinitionExists {
                name: def.name().to_string(),
            });
        }

        let view = Container::from_definitions(self.definitions.iter().cloned());
        let validated = def.run_validate(&view);
        if let Err(err) = view.close() {
            tracing::warn!(dependency = def.name(), error = %err, "Failed to close validation view");
        }
        validated?;

        tracing::debug!(dependency = def.name(), lazy = def.is_lazy(), "Definition registered");
        self.names.insert(def.name().to_string());
        self.definitions.push(def);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Build the container
    ///
    /// Each call yields a fresh container. If any eager build fails, the
    /// values already built for this snapshot are closed and no container
    /// is returned.
    pub fn build(&self) -> Result<Container> {
        let container = Container::from_definitions(self.definitions.iter().cloned());

        for def in self.definitions.iter().filter(|def| !def.is_lazy()) {
            if let Err(err) = container.safe_get_value(def.name()) {
                tracing::error!(dependency = def.name(), error = %err, "Eager build failed");
                if let Err(close_err) = container.close() {
                    tracing::warn!(error = %close_err, "Failed to close partially built container");
                }
                return Err(err);
            }
        }

        tracing::info!(
            "Container built ({} definitions, {} eager)",
            self.definitions.len(),
            self.definitions.iter().filter(|def| !def.is_lazy()).count()
        );
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_build_when_valid() {
        let mut builder = ContainerBuilder::new();
        let items = [
            ("testname1", "testval1"),
            ("testname2", "testval2"),
            ("testname3", "testval3"),
        ];

        for (name, val) in items {
            builder
                .add([Definition::new(name)
                    .build(move |_| Ok(val.to_string()))
                    .validate(|_| Ok(()))
                    .close(|_: &String| Ok(()))])
                .unwrap();
        }

        let container = builder.build().unwrap();
        assert_eq!(container.len(), 3);

        for (name, expected) in items {
            assert!(container.is_built(name));
            assert_eq!(*container.safe_get::<String>(name).unwrap(), expected);
        }
        assert!(container.close().is_ok());
    }

    #[test]
    fn test_add_rejections() {
        let mut builder = ContainerBuilder::new();
        builder
            .add([Definition::new("testname1").build(|_| Ok("testname2"))])
            .unwrap();

        let err = builder.add([Definition::new("testname1").lazy()]).unwrap_err();
        assert!(matches!(err, RegistryError::DefinitionExists { .. }));

        let err = builder
            .add([Definition::new("testname2")
                .build(|_| Ok("testval2"))
                .validate(|_| anyhow::bail!("failed to validate"))])
            .unwrap_err();
        assert!(matches!(err, RegistryError::ValidationFailed { .. }));

        let err = builder.add([Definition::new("testname4")]).unwrap_err();
        assert!(matches!(err, RegistryError::BuildFunctionMissing { .. }));

        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_validate_sees_only_earlier_definitions() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut builder = ContainerBuilder::new();

        for name in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            builder
                .add([Definition::new(name).lazy().build(|_| Ok(())).validate(
                    move |view: &Container| {
                        seen.lock().unwrap().push(view.len());
                        Ok(())
                    },
                )])
                .unwrap();
        }

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_validate_can_require_earlier_definition() {
        let mut builder = ContainerBuilder::new();
        let requires_config = |view: &Container| {
            if !view.has("config") {
                anyhow::bail!("config must be registered first");
            }
            Ok(())
        };

        let err = builder
            .add([Definition::new("db").build(|_| Ok(())).validate(requires_config)])
            .unwrap_err();
        assert!(err.to_string().contains("config must be registered first"));

        builder
            .add([
                Definition::new("config").build(|_| Ok(())),
                Definition::new("db").build(|_| Ok(())).validate(requires_config),
            ])
            .unwrap();
    }

    #[test]
    fn test_build_failure_returns_no_container() {
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        let mut builder = ContainerBuilder::new();
        builder
            .add([
                Definition::new("ok")
                    .build(|_| Ok(1u8))
                    .close(move |_: &u8| {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                Definition::new("testname3")
                    .build(|_| -> anyhow::Result<&'static str> { anyhow::bail!("failed to build") }),
            ])
            .unwrap();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, RegistryError::BuildFailed { ref name, .. } if name == "testname3"));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_each_build_is_an_independent_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut builder = ContainerBuilder::new();
        builder
            .add([Definition::new("eager").build(move |_| {
                Ok(counter.fetch_add(1, Ordering::SeqCst))
            })])
            .unwrap();

        let first = builder.build().unwrap();
        let second = builder.build().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*first.get::<usize>("eager"), 0);
        assert_eq!(*second.get::<usize>("eager"), 1);
    }

    #[test]
    fn test_lazy_definitions_stay_unbuilt() {
        let mut builder = ContainerBuilder::new();
        builder
            .add([
                Definition::new("lazy").lazy().build(|_| Ok("lazy")),
                Definition::new("broken")
                    .lazy()
                    .build(|_| -> anyhow::Result<()> { anyhow::bail!("build error") }),
            ])
            .unwrap();

        let container = builder.build().unwrap();
        assert!(!container.is_built("lazy"));
        assert_eq!(*container.get::<&str>("lazy"), "lazy");
        assert!(container.safe_get_value("broken").is_err());
    }
}
