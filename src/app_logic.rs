/*
 * This module provides the application logic layer: turning the command line
 * into a `RunContext`, routing the selected verb to its procedure, and the
 * export/restore orchestrators those procedures drive. The orchestrators only
 * talk to the outside world through the `Collaborators` set, so their unit
 * tests (`export_tests.rs`, `restore_tests.rs`) run against the doubles in
 * `mock_collaborators.rs`.
 */
pub mod error;
pub mod export;
pub mod invocation;
pub mod patch;
pub mod restore;
pub mod router;
pub mod run_context;

#[cfg(test)]
mod mock_collaborators;


pub use error::BatchError;
pub use invocation::{Invocation, parse_arguments};
pub use run_context::{Collaborators, RunContext};
