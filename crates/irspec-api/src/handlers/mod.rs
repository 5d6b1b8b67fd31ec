//! HTTP handlers

pub mod arduino;
pub mod frontend;
pub mod mircat;
pub mod system;
