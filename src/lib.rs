//! rb-site library
//!
//! Core functionality for the site installation and administration tool:
//! the site model and its provisioning operations, the dependency prober,
//! the wizard presentation backends and the command implementations.

pub mod cli;
pub mod commands;
pub mod deps;
pub mod error;
pub mod normalize;
pub mod site;
pub mod templates;
pub mod types;
pub mod ui;

// Re-export main types for convenience
pub use deps::{CapabilityGroup, ExecProber, Prober};
pub use error::{Result, SiteError};
pub use site::Site;
pub use types::{CacheType, DbType, PythonLoader, WebServerType};
pub use ui::{ConsoleUi, PageFlow, TuiWizard, UiToolkit};
