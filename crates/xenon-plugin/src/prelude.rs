//! Prelude for plugin entry points.

pub use crate::builder::PluginBuilder;
pub use crate::hooks::{Hook, Priority};
pub use xenon_core::{AppError, AppResult};

pub use crate::entry_point;
