//! Dependency probing
//!
//! Checks which optional and required capabilities the host can actually
//! serve before the wizard offers them. A capability (say, MySQL support) is
//! available when any one of its named providers can be found; a capability
//! group is fatal only when it is required and *every* capability in it is
//! unavailable.
//!
//! Probing goes through the [`Prober`] trait so tests can inject a fake
//! instead of inspecting the host.

use std::path::{Path, PathBuf};

/// One capability with its alternative providers.
pub struct Capability {
    pub label: &'static str,
    pub providers: &'static [&'static str],
}

/// A named set of capabilities sharing a required/optional flag.
pub struct CapabilityGroup {
    pub title: &'static str,
    pub required: bool,
    pub capabilities: &'static [Capability],
}

pub static MEMCACHED_PROVIDERS: &[&str] = &["memcached"];
pub static SQLITE_PROVIDERS: &[&str] = &["sqlite3"];
pub static MYSQL_PROVIDERS: &[&str] = &["mysql", "mariadb"];
pub static POSTGRESQL_PROVIDERS: &[&str] = &["psql"];

/// Cache backends the generated site can use.
pub static CACHE_GROUP: CapabilityGroup = CapabilityGroup {
    title: "Server Cache",
    required: false,
    capabilities: &[Capability {
        label: "memcached",
        providers: MEMCACHED_PROVIDERS,
    }],
};

/// Database backends the generated site can use. At least one must be
/// present for an install to make sense.
pub static DB_GROUP: CapabilityGroup = CapabilityGroup {
    title: "Databases",
    required: true,
    capabilities: &[
        Capability {
            label: "sqlite3",
            providers: SQLITE_PROVIDERS,
        },
        Capability {
            label: "MySQL",
            providers: MYSQL_PROVIDERS,
        },
        Capability {
            label: "PostgreSQL",
            providers: POSTGRESQL_PROVIDERS,
        },
    ],
};

/// The groups an install probes, in report order.
pub static INSTALL_GROUPS: [&CapabilityGroup; 2] = [&CACHE_GROUP, &DB_GROUP];

/// Answers whether a single named provider is present on this host.
pub trait Prober {
    fn is_available(&self, provider: &str) -> bool;
}

/// Report for one group with at least one missing capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingGroup {
    pub title: String,
    pub missing: Vec<String>,
}

/// Probe every group and collect the missing capabilities.
///
/// Returns `(fatal, reports)`. `fatal` is true only when some required group
/// has all of its capabilities missing; a required group with one working
/// capability never blocks the install, no matter how many of its siblings
/// are absent.
pub fn probe_missing(groups: &[&CapabilityGroup], prober: &dyn Prober) -> (bool, Vec<MissingGroup>) {
    let mut fatal = false;
    let mut reports = Vec::new();

    for group in groups {
        let missing: Vec<String> = group
            .capabilities
            .iter()
            .filter(|cap| !capability_available(cap, prober))
            .map(|cap| format!("{} ({})", cap.label, cap.providers.join(", ")))
            .collect();

        if missing.is_empty() {
            continue;
        }

        let title = if group.required && missing.len() == group.capabilities.len() {
            fatal = true;
            format!("{} (required)", group.title)
        } else {
            format!("{} (optional)", group.title)
        };

        reports.push(MissingGroup { title, missing });
    }

    (fatal, reports)
}

/// True when any provider of the capability is present.
pub fn capability_available(cap: &Capability, prober: &dyn Prober) -> bool {
    cap.providers.iter().any(|p| prober.is_available(p))
}

fn any_available(providers: &[&str], prober: &dyn Prober) -> bool {
    providers.iter().any(|p| prober.is_available(p))
}

pub fn support_memcached(prober: &dyn Prober) -> bool {
    any_available(MEMCACHED_PROVIDERS, prober)
}

pub fn support_sqlite(prober: &dyn Prober) -> bool {
    any_available(SQLITE_PROVIDERS, prober)
}

pub fn support_mysql(prober: &dyn Prober) -> bool {
    any_available(MYSQL_PROVIDERS, prober)
}

pub fn support_postgresql(prober: &dyn Prober) -> bool {
    any_available(POSTGRESQL_PROVIDERS, prober)
}

/// Probes for providers as executables on `PATH`.
pub struct ExecProber;

impl Prober for ExecProber {
    fn is_available(&self, provider: &str) -> bool {
        find_in_path(provider).is_some()
    }
}

/// Search `PATH` for an executable file with the given name.
fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;

    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }

    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
