//! Built-in operators that every registry starts with.

use crate::Operator;

/// Operator that does nothing. Used to group tasks in a workflow.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyOperator;

impl Operator for DummyOperator {
    fn class_name(&self) -> &str {
        "DummyOperator"
    }

    fn module_path(&self) -> &str {
        "airflow.operators.dummy_operator"
    }

    fn ui_color(&self) -> &str {
        "#e8f7e4"
    }
}

/// Operator that runs a shell command.
#[derive(Debug, Default, Clone, Copy)]
pub struct BashOperator;

impl Operator for BashOperator {
    fn class_name(&self) -> &str {
        "BashOperator"
    }

    fn module_path(&self) -> &str {
        "airflow.operators.bash_operator"
    }

    fn ui_color(&self) -> &str {
        "#f0ede4"
    }

    fn template_fields(&self) -> Vec<String> {
        vec!["bash_command".to_string(), "env".to_string()]
    }
}
