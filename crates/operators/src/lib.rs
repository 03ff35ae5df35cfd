//! `operators` crate: the `Operator` trait, the operator registry, and the
//! built-in operator implementations.
//!
//! A task's class reference (`class_name` + `module_path`) is resolved through
//! an [`OperatorRegistry`] when the workflow is loaded, never by dynamic lookup
//! at query time.

pub mod builtin;
pub mod error;
pub mod mock;
pub mod registry;
pub mod traits;

pub use error::OperatorError;
pub use registry::OperatorRegistry;
pub use traits::{ClassRef, Operator};
