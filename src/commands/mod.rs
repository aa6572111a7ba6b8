//! Command implementations
//!
//! Each subcommand is a small module taking the context it needs explicitly:
//! the site model, the active presentation backend (install only) and the
//! dependency prober. There is no shared mutable state beyond what is passed
//! in.

pub mod install;
pub mod manage;
pub mod upgrade;
