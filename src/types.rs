//! Type-safe configuration vocabularies for rb-site
//!
//! This module replaces stringly-typed configuration with proper Rust enums
//! that provide compile-time validation and exhaustive matching. The string
//! forms are what the wizard displays and what the command line accepts.

use strum::{Display, EnumString};

/// Database backend for the generated site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DbType {
    #[strum(serialize = "mysql")]
    Mysql,
    #[strum(serialize = "postgresql")]
    Postgresql,
    #[strum(serialize = "sqlite3")]
    Sqlite3,
}

impl DbType {
    /// Engine identifier written into the generated settings file.
    ///
    /// PostgreSQL deployments use the psycopg2 engine name expected by the
    /// generated application.
    pub fn engine(&self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql_psycopg2",
            Self::Sqlite3 => "sqlite3",
        }
    }

    /// Whether this backend stores its data in a file inside the site tree
    /// rather than on a database server.
    pub fn is_file_backed(&self) -> bool {
        matches!(self, Self::Sqlite3)
    }
}

/// Cache backend for the generated site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CacheType {
    #[strum(serialize = "memcached")]
    Memcached,
    #[strum(serialize = "file")]
    File,
}

/// Web server the generated configuration targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum WebServerType {
    #[strum(serialize = "apache")]
    Apache,
    #[strum(serialize = "lighttpd")]
    Lighttpd,
}

/// Loader module used to run the application under the web server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PythonLoader {
    #[strum(serialize = "modpython")]
    Modpython,
    #[strum(serialize = "fastcgi")]
    Fastcgi,
}
