use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// rb-site - site installation and administration tool
#[derive(Parser)]
#[command(name = "rb-site")]
#[command(about = "Installs and maintains Review Board site deployments")]
#[command(version)]
pub struct Cli {
    /// Force the console UI even when the full-screen wizard is available
    #[arg(long, global = true)]
    pub console: bool,

    /// Display debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a new site tree and generate web server configuration files.
    ///
    /// This will ask several questions about the site before performing the
    /// installation, unless --noinput is given with the answers as options.
    Install {
        /// Path of the site directory to create
        path: PathBuf,

        #[command(flatten)]
        options: InstallArgs,
    },
    /// Upgrade an existing site installation, rebuilding media trees and
    /// upgrading the database, unless otherwise specified
    Upgrade {
        /// Path of the site directory to upgrade
        path: PathBuf,

        /// Don't upgrade the database
        #[arg(long = "no-db-upgrade", action = clap::ArgAction::SetFalse)]
        upgrade_db: bool,
    },
    /// Run a management command on the site
    Manage {
        /// Path of the site directory
        path: PathBuf,

        /// Management command to run
        command: String,

        /// Arguments forwarded to the management command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// Options for the 'install' command
#[derive(Args)]
pub struct InstallArgs {
    /// Copy media files instead of symlinking
    #[arg(long, default_value_t = cfg!(windows))]
    pub copy_media: bool,

    /// Run non-interactively using configuration provided in command-line
    /// options
    #[arg(long)]
    pub noinput: bool,

    /// Full domain name of the site, excluding the http://, port or path
    #[arg(long)]
    pub domain_name: Option<String>,

    /// Path to the site relative to the domain name
    #[arg(long, default_value = "/")]
    pub site_root: String,

    /// The URL containing the media files
    #[arg(long, default_value = "media/")]
    pub media_url: String,

    /// Database type (mysql, postgresql or sqlite3)
    #[arg(long)]
    pub db_type: Option<String>,

    /// Database name (not for sqlite3)
    #[arg(long, default_value = "reviewboard")]
    pub db_name: String,

    /// Database host (not for sqlite3)
    #[arg(long, default_value = "localhost")]
    pub db_host: String,

    /// Database user (not for sqlite3)
    #[arg(long)]
    pub db_user: Option<String>,

    /// Password for the database user (not for sqlite3)
    #[arg(long)]
    pub db_pass: Option<String>,

    /// Cache server type (memcached or file)
    #[arg(long)]
    pub cache_type: Option<String>,

    /// Cache identifier (memcached connection string or file cache
    /// directory)
    #[arg(long)]
    pub cache_info: Option<String>,

    /// Web server (apache or lighttpd)
    #[arg(long)]
    pub web_server_type: Option<String>,

    /// Python loader for apache (modpython or fastcgi)
    #[arg(long)]
    pub python_loader: Option<String>,

    /// The site administrator's username
    #[arg(long, default_value = "admin")]
    pub admin_user: String,

    /// The site administrator's password
    #[arg(long)]
    pub admin_password: Option<String>,

    /// The site administrator's e-mail address
    #[arg(long)]
    pub admin_email: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
