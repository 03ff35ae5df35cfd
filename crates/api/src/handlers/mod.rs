pub mod health;
pub mod tasks;
pub mod workflows;

pub(crate) use super::AppState;
