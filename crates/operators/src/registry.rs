//! Operator registry: maps stable identifiers to `Operator` handlers.
//!
//! The identifier is `"{module_path}.{class_name}"`. A bare class name is
//! accepted as a shorthand as long as exactly one registered handler carries
//! it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::builtin::{BashOperator, DummyOperator};
use crate::{ClassRef, Operator, OperatorError};

/// Registry of operator handlers, resolved at workflow load time.
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    handlers: BTreeMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in operators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for handler in [
            Arc::new(DummyOperator) as Arc<dyn Operator>,
            Arc::new(BashOperator) as Arc<dyn Operator>,
        ] {
            // Built-in identifiers are distinct, so this cannot collide.
            let key = handler.class_ref().key();
            registry.handlers.insert(key, handler);
        }
        registry
    }

    /// Register a handler under its class reference.
    ///
    /// # Errors
    /// [`OperatorError::AlreadyRegistered`] if the identifier is taken.
    pub fn register(&mut self, handler: Arc<dyn Operator>) -> Result<(), OperatorError> {
        let key = handler.class_ref().key();
        if self.handlers.contains_key(&key) {
            return Err(OperatorError::AlreadyRegistered(key));
        }
        debug!("registered operator '{}'", key);
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Resolve an identifier (`module.Class` or bare `Class`) to its handler.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn Operator>, OperatorError> {
        if let Some(handler) = self.handlers.get(identifier) {
            return Ok(Arc::clone(handler));
        }

        let candidates: Vec<&Arc<dyn Operator>> = self
            .handlers
            .values()
            .filter(|h| h.class_name() == identifier)
            .collect();

        match candidates.as_slice() {
            [only] => Ok(Arc::clone(only)),
            [] => Err(OperatorError::UnknownOperator(identifier.to_owned())),
            many => Err(OperatorError::Ambiguous {
                name: identifier.to_owned(),
                candidates: many.iter().map(|h| h.class_ref().key()).collect(),
            }),
        }
    }

    /// Resolve a full class reference.
    pub fn resolve_ref(&self, class_ref: &ClassRef) -> Result<Arc<dyn Operator>, OperatorError> {
        self.handlers
            .get(&class_ref.key())
            .cloned()
            .ok_or_else(|| OperatorError::UnknownOperator(class_ref.key()))
    }

    /// Registered identifiers in sorted order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
