//! Utility modules: retry, pausing, run locking.

pub mod lock;
pub mod pause;
pub mod retry;
