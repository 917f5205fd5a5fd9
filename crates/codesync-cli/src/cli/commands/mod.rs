//! CLI command handlers.

mod sync;

pub use sync::{plan_sync, run_sync};

#[cfg(test)]
pub(crate) use sync::describe;
