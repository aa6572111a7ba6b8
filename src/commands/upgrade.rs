//! The 'upgrade' command
//!
//! Rebuilds the site directory tree and, unless disabled, re-runs the
//! database sync and migrations. No wizard is involved; progress is plain
//! status lines.

use tracing::info;

use crate::error::Result;
use crate::site::Site;

pub fn run(site: &Site, upgrade_db: bool) -> Result<()> {
    info!(dir = %site.install_dir.display(), upgrade_db, "upgrading site");

    println!("Rebuilding directory structure");
    site.rebuild_site_directory()?;

    if upgrade_db {
        println!("Updating database. This may take a while.");
        site.sync_database()?;
        site.migrate_database()?;
    }

    Ok(())
}
