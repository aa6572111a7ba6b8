//! The 'manage' command
//!
//! Forwards an arbitrary subcommand to the generated application's own
//! management interface, bypassing the wizard and the step pipeline
//! entirely. The child's exit code becomes ours.

use tracing::info;

use crate::error::Result;
use crate::site::Site;

pub fn run(site: &Site, command: &str, args: &[String]) -> Result<i32> {
    info!(command, "forwarding management command");

    let params: Vec<&str> = args.iter().map(String::as_str).collect();
    site.run_manage_command(command, &params, &[])
}
