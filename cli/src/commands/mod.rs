//! Command implementations

pub mod destroy;
pub mod run;
pub mod validate;
pub mod version;
