use crate::di::Container;
use crate::error::{RegistryError, Result, share};
use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

/// A built dependency as stored in the container.
pub type Value = Arc<dyn Any + Send + Sync>;

pub(crate) type BuildFn = Arc<dyn Fn(&Container) -> anyhow::Result<Value> + Send + Sync>;
pub(crate) type ValidateFn = Arc<dyn Fn(&Container) -> anyhow::Result<()> + Send + Sync>;
pub(crate) type CloseFn = Arc<dyn Fn(&str, &Value) -> Result<()> + Send + Sync>;

/// Recipe for building, validating and closing one named dependency.
///
/// # Example
/// ```
/// use corekit::di::Definition;
///
/// let def = Definition::new("greeting")
///     .lazy()
///     .build(|_| Ok(String::from("hello")))
///     .close(|value: &String| {
///         println!("dropping {value}");
///         Ok(())
///     });
/// assert_eq!(def.name(), "greeting");
/// ```
#[derive(Clone)]
pub struct Definition {
    name: String,
    lazy: bool,
    build: Option<BuildFn>,
    validate: Option<ValidateFn>,
    close: Option<CloseFn>,
}

impl Definition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lazy: false,
            build: None,
            validate: None,
            close: None,
        }
    }

    /// Defers the build until the first lookup.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn set_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn build<T, F>(mut self, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.build = Some(Arc::new(move |container| {
            build(container).map(|value| Arc::new(value) as Value)
        }));
        self
    }

    /// Runs once when the definition is added to a builder.
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&Container) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Finalizes the built value. `T` must match the type returned by the build function.
    pub fn close<T, F>(mut self, close: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.close = Some(Arc::new(move |name, value| {
            let typed = value
                .downcast_ref::<T>()
                .ok_or_else(|| RegistryError::DowncastFailed {
                    name: name.to_string(),
                    type_name: type_name::<T>(),
                })?;
            close(typed).map_err(|e| RegistryError::CloseFailed {
                name: name.to_string(),
                source: share(e),
            })
        }));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn has_build(&self) -> bool {
        self.build.is_some()
    }

    pub(crate) fn check_registrable(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !self.lazy && self.build.is_none() {
            return Err(RegistryError::BuildFunctionMissing {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn run_validate(&self, view: &Container) -> Result<()> {
        let Some(validate) = &self.validate else {
            return Ok(());
        };
        validate(view).map_err(|e| RegistryError::ValidationFailed {
            name: self.name.clone(),
            source: share(e),
        })
    }

    pub(crate) fn run_build(&self, container: &Container) -> Result<Value> {
        let build = self
            .build
            .as_ref()
            .ok_or_else(|| RegistryError::BuildFunctionMissing {
                name: self.name.clone(),
            })?;
        build(container).map_err(|e| RegistryError::BuildFailed {
            name: self.name.clone(),
            source: share(e),
        })
    }

    pub(crate) fn run_close(&self, value: &Value) -> Option<Result<()>> {
        self.close.as_ref().map(|close| close(&self.name, value))
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("lazy", &self.lazy)
            .field("build", &self.build.is_some())
            .field("validate", &self.validate.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eager_definition_requires_build() {
        let err = Definition::new("eager").check_registrable().unwrap_err();
        assert!(matches!(err, RegistryError::BuildFunctionMissing { name } if name == "eager"));

        assert!(Definition::new("lazy").lazy().check_registrable().is_ok());
        assert!(matches!(
            Definition::new("").lazy().check_registrable(),
            Err(RegistryError::EmptyName)
        ));
    }

    #[test]
    fn test_close_with_wrong_type() {
        let def = Definition::new("num").close(|_: &String| Ok(()));
        let value: Value = Arc::new(7u32);

        let err = def.run_close(&value).unwrap().unwrap_err();
        assert!(matches!(err, RegistryError::DowncastFailed { name, .. } if name == "num"));
    }
}
