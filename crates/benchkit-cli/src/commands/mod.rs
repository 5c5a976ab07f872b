//! CLI command implementations.

pub mod common;
pub mod knee;
pub mod thd;
