use crate::di::definition::{Definition, Value};
use crate::error::{RegistryError, Result};
use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Thread-safe dependency container.
///
/// Every definition owns one slot. A lookup holds the slot's lock across
/// the lookup, the build and the write-back, so concurrent first accesses
/// run the build function exactly once. A build that fails (or panics) is
/// recorded and surfaced on every later lookup; it is never retried.
pub struct Container {
    slots: Vec<Slot>,
    index: HashMap<String, usize>,
}

struct Slot {
    def: Definition,
    state: Mutex<SlotState>,
}

struct SlotState {
    outcome: Outcome,
    closed: bool,
}

enum Outcome {
    Pending,
    Built(Value),
    Failed(RegistryError),
}

impl Slot {
    fn new(def: Definition) -> Self {
        Self {
            def,
            state: Mutex::new(SlotState {
                outcome: Outcome::Pending,
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

thread_local! {
    // Slots this thread is currently resolving, outermost first.
    static RESOLVING: RefCell<Vec<(usize, usize, String)>> = const { RefCell::new(Vec::new()) };
}

struct ResolveGuard;

impl ResolveGuard {
    fn enter(container: usize, slot: usize, name: &str) -> Result<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack
                .iter()
                .position(|(c, s, _)| *c == container && *s == slot)
            {
                let mut cycle: Vec<&str> = stack[pos..].iter().map(|(_, _, n)| n.as_str()).collect();
                cycle.push(name);
                return Err(RegistryError::CircularDependency {
                    cycle: cycle.join(" -> "),
                });
            }
            stack.push((container, slot, name.to_string()));
            Ok(ResolveGuard)
        })
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl Container {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub(crate) fn from_definitions(defs: impl IntoIterator<Item = Definition>) -> Self {
        let mut container = Self::new();
        for def in defs {
            container
                .index
                .insert(def.name().to_string(), container.slots.len());
            container.slots.push(Slot::new(def));
        }
        container
    }

    /// Checks whether a dependency is registered. Never builds.
    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether the dependency's build function has already run successfully.
    pub fn is_built(&self, name: &str) -> bool {
        self.index
            .get(name)
            .is_some_and(|&idx| matches!(self.slots[idx].lock().outcome, Outcome::Built(_)))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.def.name())
    }

    /// Returns the built dependency, building it first if needed.
    pub fn safe_get_value(&self, name: &str) -> Result<Value> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| RegistryError::not_found(name))?;
        let slot = &self.slots[idx];

        let _resolving = ResolveGuard::enter(self as *const Self as usize, idx, name)?;
        let mut state = slot.lock();

        match &state.outcome {
            Outcome::Built(value) => return Ok(Arc::clone(value)),
            Outcome::Failed(err) => return Err(err.clone()),
            Outcome::Pending => {}
        }

        tracing::debug!(dependency = name, lazy = slot.def.is_lazy(), "Building dependency");

        // Stays recorded if the build function panics.
        state.outcome = Outcome::Failed(RegistryError::BuildAborted {
            name: name.to_string(),
        });

        match slot.def.run_build(self) {
            Ok(value) => {
                state.outcome = Outcome::Built(Arc::clone(&value));
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(dependency = name, error = %err, "Dependency build failed");
                state.outcome = Outcome::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Typed lookup. Fails with [`RegistryError::DowncastFailed`] on a type mismatch.
    pub fn safe_get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.safe_get_value(name)?
            .downcast::<T>()
            .map_err(|_| RegistryError::DowncastFailed {
                name: name.to_string(),
                type_name: type_name::<T>(),
            })
    }

    /// Typed lookup for dependencies the caller cannot work without.
    ///
    /// # Panics
    ///
    /// Aborts the calling task with the [`RegistryError`] as panic payload if the
    /// dependency is missing, failed to build, or has a different type.
    #[track_caller]
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Arc<T> {
        match self.safe_get::<T>(name) {
            Ok(value) => value,
            Err(err) => abort_lookup(name, err),
        }
    }

    /// Untyped variant of [`Container::get`].
    #[track_caller]
    pub fn get_value(&self, name: &str) -> Value {
        match self.safe_get_value(name) {
            Ok(value) => value,
            Err(err) => abort_lookup(name, err),
        }
    }

    /// Finalizes every built dependency in reverse registration order.
    ///
    /// Each dependency is closed at most once, so calling this again only
    /// closes what was built since the previous call. All close functions
    /// run even if some fail; the failures are joined.
    pub fn close(&self) -> Result<()> {
        let mut errors = Vec::new();

        for slot in self.slots.iter().rev() {
            let mut state = slot.lock();
            if state.closed {
                continue;
            }
            let Outcome::Built(value) = &state.outcome else {
                continue;
            };

            tracing::debug!(dependency = slot.def.name(), "Closing dependency");
            if let Some(Err(err)) = slot.def.run_close(value) {
                tracing::warn!(dependency = slot.def.name(), error = %err, "Dependency close failed");
                errors.push(err);
            }
            state.closed = true;
        }

        match RegistryError::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[track_caller]
fn abort_lookup(name: &str, err: RegistryError) -> ! {
    tracing::error!(dependency = name, error = %err, "Required dependency is unavailable");
    std::panic::panic_any(err)
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
