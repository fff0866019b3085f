//! CLI Support
//!
//! Command implementations and console output helpers.

pub mod commands;
pub mod ui;
