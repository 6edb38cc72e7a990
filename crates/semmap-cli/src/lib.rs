//! Command line front end for semmap workspaces.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod progress;
pub mod summary;
