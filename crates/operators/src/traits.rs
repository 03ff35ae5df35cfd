//! The `Operator` trait: the contract every task implementation must fulfil.

use std::fmt;

/// Default background colour for operators that do not override it.
pub const DEFAULT_UI_COLOR: &str = "#fff";
/// Default foreground colour for operators that do not override it.
pub const DEFAULT_UI_FGCOLOR: &str = "#000";

/// Reference to the implementation backing a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassRef {
    pub class_name: String,
    pub module_path: String,
}

impl ClassRef {
    pub fn new(class_name: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            module_path: module_path.into(),
        }
    }

    /// Stable registry key: `"{module_path}.{class_name}"`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.module_path, self.class_name)
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module_path, self.class_name)
    }
}

/// The core operator trait.
///
/// Implementations describe the static, display-level properties shared by
/// every task built from them. Execution is not part of this contract.
pub trait Operator: Send + Sync + fmt::Debug {
    /// Class name, e.g. `DummyOperator`.
    fn class_name(&self) -> &str;

    /// Defining module, e.g. `airflow.operators.dummy_operator`.
    fn module_path(&self) -> &str;

    fn ui_color(&self) -> &str {
        DEFAULT_UI_COLOR
    }

    fn ui_fgcolor(&self) -> &str {
        DEFAULT_UI_FGCOLOR
    }

    /// Fields rendered through the templating engine before execution.
    fn template_fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Names of the operator's extra links.
    fn extra_links(&self) -> Vec<String> {
        Vec::new()
    }

    fn class_ref(&self) -> ClassRef {
        ClassRef::new(self.class_name(), self.module_path())
    }
}
