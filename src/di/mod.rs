//! Dependency container.
//!
//! Definitions are collected by a [`ContainerBuilder`], which produces an
//! immutable [`Container`]. Eager definitions are built during
//! [`ContainerBuilder::build`]; lazy ones on first lookup.

mod builder;
mod container;
mod definition;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use definition::{Definition, Value};
