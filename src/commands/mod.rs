//! CLI command implementations for pstree-prof.
//!
//! This module provides implementations for:
//! - `run`: the default mode, launch + sample + summarize
//! - `check`: one-shot process table capture and subtree report

pub mod check;
pub mod run;

// Re-export command functions
pub use check::command_check;
pub use run::command_run;
