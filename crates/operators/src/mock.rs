//! `MockOperator`: a test double for `Operator`.
//!
//! Lets tests register operators with arbitrary class references, colours,
//! template fields, and extra links without defining a new type each time.

use crate::Operator;
use crate::traits::{DEFAULT_UI_COLOR, DEFAULT_UI_FGCOLOR};

/// An operator whose every property is set by the caller.
#[derive(Debug, Clone)]
pub struct MockOperator {
    pub class_name: String,
    pub module_path: String,
    pub ui_color: String,
    pub ui_fgcolor: String,
    pub template_fields: Vec<String>,
    pub extra_links: Vec<String>,
}

impl MockOperator {
    pub fn new(class_name: impl Into<String>, module_path: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            module_path: module_path.into(),
            ui_color: DEFAULT_UI_COLOR.to_string(),
            ui_fgcolor: DEFAULT_UI_FGCOLOR.to_string(),
            template_fields: Vec::new(),
            extra_links: Vec::new(),
        }
    }

    pub fn with_colors(mut self, ui_color: impl Into<String>, ui_fgcolor: impl Into<String>) -> Self {
        self.ui_color = ui_color.into();
        self.ui_fgcolor = ui_fgcolor.into();
        self
    }

    pub fn with_template_fields(mut self, fields: &[&str]) -> Self {
        self.template_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_extra_links(mut self, links: &[&str]) -> Self {
        self.extra_links = links.iter().map(|l| l.to_string()).collect();
        self
    }
}

impl Operator for MockOperator {
    fn class_name(&self) -> &str {
        &self.class_name
    }

    fn module_path(&self) -> &str {
        &self.module_path
    }

    fn ui_color(&self) -> &str {
        &self.ui_color
    }

    fn ui_fgcolor(&self) -> &str {
        &self.ui_fgcolor
    }

    fn template_fields(&self) -> Vec<String> {
        self.template_fields.clone()
    }

    fn extra_links(&self) -> Vec<String> {
        self.extra_links.clone()
    }
}
