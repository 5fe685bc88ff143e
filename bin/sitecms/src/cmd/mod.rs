//! CLI command implementations.

pub mod check;
pub mod freeze;
pub mod new;
pub mod serve;
