//! Command-line front end for the budget engine: configuration, logging and
//! the work behind each `budget-calc` subcommand.

pub mod commands;
pub mod config;
pub mod logging;
pub mod summary;
