//! CLI command implementations

pub mod catalog;
pub mod hints;
pub mod overlay;
pub mod translate;
