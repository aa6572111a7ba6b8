//! The site model
//!
//! [`Site`] is the mutable aggregate everything the wizard collects flows
//! into, identified by its install directory. The provisioning operations on
//! it (directory tree, configuration files, database, administrator account,
//! saved settings) are what the step pipeline runs once input collection is
//! done.
//!
//! The generated web application is an external collaborator: database and
//! settings operations go through its own management interface, resolved
//! inside the site tree (overridable through `RBSITE_MANAGE` so tests can
//! substitute a stub).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Result, SiteError};
use crate::templates::{self, TemplateVars};
use crate::types::{CacheType, DbType, PythonLoader, WebServerType};

/// Character set for generated secret keys.
const SECRET_KEY_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*(-_=+)";

/// Bundled media trees linked or copied into every site.
const BUNDLED_MEDIA_DIRS: [&str; 2] = ["admin", "rb"];

/// A site installation rooted at one install directory.
///
/// All collected fields start unset and are populated either by wizard
/// bindings or directly from command-line flags in non-interactive mode.
#[derive(Debug)]
pub struct Site {
    pub install_dir: PathBuf,
    pub abs_install_dir: PathBuf,
    /// Identifier derived from the install directory's base name, usable in
    /// file names and server socket names.
    pub site_id: String,

    // State collected during installation
    pub domain_name: Option<String>,
    pub site_root: Option<String>,
    pub media_url: Option<String>,
    pub db_type: Option<DbType>,
    pub db_name: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<String>,
    pub db_user: Option<String>,
    pub db_pass: Option<String>,
    pub cache_type: Option<CacheType>,
    pub cache_info: Option<String>,
    pub web_server_type: Option<WebServerType>,
    pub python_loader: Option<PythonLoader>,
    pub admin_user: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,

    /// Copy bundled media instead of symlinking it.
    pub copy_media: bool,
    /// Where the bundled media trees live. Defaults to `RBSITE_DATA_DIR` or
    /// a `data/` directory beside the executable's working directory.
    pub bundled_data_dir: PathBuf,
    /// Override for the site's management interface executable.
    pub manage_override: Option<PathBuf>,
}

impl Site {
    /// Create a site model for an install directory. The directory does not
    /// have to exist yet.
    pub fn new(install_dir: &Path) -> Result<Self> {
        let abs_install_dir = std::path::absolute(install_dir)?;

        let site_id = install_dir
            .file_name()
            .map(|name| {
                name.to_string_lossy()
                    .replace(' ', "_")
                    .replace('.', "_")
            })
            .unwrap_or_else(|| "site".to_string());

        let bundled_data_dir = std::env::var_os("RBSITE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        let manage_override = std::env::var_os("RBSITE_MANAGE").map(PathBuf::from);

        Ok(Self {
            install_dir: install_dir.to_path_buf(),
            abs_install_dir,
            site_id,
            domain_name: None,
            site_root: None,
            media_url: None,
            db_type: None,
            db_name: None,
            db_host: None,
            db_port: None,
            db_user: None,
            db_pass: None,
            cache_type: None,
            cache_info: None,
            web_server_type: None,
            python_loader: None,
            admin_user: None,
            admin_password: None,
            admin_email: None,
            copy_media: cfg!(windows),
            bundled_data_dir,
            manage_override,
        })
    }

    /// Rebuild the site directory hierarchy.
    ///
    /// Safe to run over an existing tree; existing directories are kept and
    /// bundled media links are refreshed.
    pub fn rebuild_site_directory(&self) -> Result<()> {
        info!(dir = %self.install_dir.display(), "rebuilding site directory tree");

        let htdocs_dir = self.install_dir.join("htdocs");
        let media_dir = htdocs_dir.join("media");

        mkdir(&self.install_dir)?;
        mkdir(&self.install_dir.join("logs"))?;
        mkdir(&self.install_dir.join("conf"))?;

        let tmp_dir = self.install_dir.join("tmp");
        mkdir(&tmp_dir)?;
        make_world_writable(&tmp_dir)?;

        if self.db_type == Some(DbType::Sqlite3) {
            mkdir(&self.install_dir.join("db"))?;
        }

        mkdir(&htdocs_dir)?;
        mkdir(&media_dir)?;

        mkdir(&media_dir.join("uploaded"))?;
        mkdir(&media_dir.join("uploaded").join("images"))?;

        self.link_bundled_dir("htdocs/errordocs", Path::new("htdocs/errordocs"))?;

        for name in BUNDLED_MEDIA_DIRS {
            self.link_bundled_dir(
                &format!("htdocs/media/{name}"),
                &Path::new("htdocs/media").join(name),
            )?;
        }

        // Shared widget media ships either standalone or inside our own
        // media tree, depending on how the package was built.
        let djblets_dest = Path::new("htdocs/media").join("djblets");
        if self.bundled_data_dir.join("djblets/media").is_dir() {
            self.link_bundled_dir("djblets/media", &djblets_dest)?;
        } else if self.bundled_data_dir.join("htdocs/media/djblets").is_dir() {
            self.link_bundled_dir("htdocs/media/djblets", &djblets_dest)?;
        } else {
            return Err(SiteError::general(
                "Unable to find the Djblets media path. Make sure Djblets is \
                 installed and try this again.",
            ));
        }

        self.write_media_htaccess(&media_dir)?;

        Ok(())
    }

    /// Generate the web server, cron and site settings files in `conf/`.
    pub fn generate_config_files(&self) -> Result<()> {
        let web_server = required(self.web_server_type, "a web server type")?;
        let conf = templates::web_server_conf(web_server, self.python_loader)?;
        let vars = self.template_vars()?;

        let conf_dir = self.install_dir.join("conf");
        let htdocs_dir = self.install_dir.join("htdocs");

        info!(file = conf.filename, "generating web server configuration");
        fs::write(
            conf_dir.join(conf.filename),
            templates::render(conf.contents, &vars)?,
        )?;
        fs::write(
            conf_dir.join("search-cron.conf"),
            templates::render(templates::SEARCH_CRON_CONF, &vars)?,
        )?;

        if conf.enables_fastcgi {
            let fcgi_path = htdocs_dir.join("reviewboard.fcgi");
            fs::write(&fcgi_path, templates::render(templates::FCGI_SCRIPT, &vars)?)?;
            make_executable(&fcgi_path)?;
        }

        self.write_settings_file(&conf_dir)
    }

    /// Synchronize the database schema through the management interface.
    pub fn sync_database(&self) -> Result<()> {
        self.run_manage_checked("syncdb", &["--noinput"], &[])?;
        self.run_manage_checked("registerscmtools", &[], &[])
    }

    /// Apply pending database migrations.
    pub fn migrate_database(&self) -> Result<()> {
        self.run_manage_checked("evolve", &["--noinput", "--execute"], &[])
    }

    /// Create the administrator account.
    ///
    /// The password goes to the management interface through the environment
    /// so it never appears in a process listing.
    pub fn create_admin_user(&self) -> Result<()> {
        let user = required_str(&self.admin_user, "an administrator username")?;
        let email = required_str(&self.admin_email, "an administrator e-mail address")?;
        let password = required_str(&self.admin_password, "an administrator password")?;

        self.run_manage_checked(
            "createadmin",
            &["--username", user, "--email", email],
            &[("RBSITE_ADMIN_PASSWORD", password)],
        )
    }

    /// Persist site metadata into the generated application's own
    /// configuration store.
    pub fn save_settings(&self) -> Result<()> {
        let domain = required_str(&self.domain_name, "a domain name")?;
        let site_root = required_str(&self.site_root, "a site root")?;
        let media_url = required_str(&self.media_url, "a media URL")?;
        let admin_user = required_str(&self.admin_user, "an administrator username")?;
        let admin_email = required_str(&self.admin_email, "an administrator e-mail address")?;

        let site_media_url = if media_url.starts_with("http") {
            media_url.to_string()
        } else {
            format!("{site_root}{media_url}")
        };

        let site_media_root = self.abs_install_dir.join("htdocs").join("media");
        let site_media_root = site_media_root.display().to_string();

        self.run_manage_checked("set-site-domain", &[domain], &[])?;

        for (key, value) in [
            ("site_media_url", site_media_url.as_str()),
            ("site_media_root", site_media_root.as_str()),
            ("site_admin_name", admin_user),
            ("site_admin_email", admin_email),
        ] {
            self.run_manage_checked("set-siteconfig", &["--key", key, "--value", value], &[])?;
        }

        Ok(())
    }

    /// Run a command through the site's management interface, forwarding
    /// stdio, and return its exit code.
    pub fn run_manage_command(
        &self,
        cmd: &str,
        params: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<i32> {
        let manage = self.manage_path();
        debug!(manage = %manage.display(), cmd, ?params, "running manager command");

        let mut command = Command::new(&manage);
        command.arg(cmd).args(params);
        for (key, value) in envs {
            command.env(key, value);
        }

        let status = command.status().map_err(|e| {
            SiteError::manage(format!(
                "Unable to execute the manager command {cmd}: {e}"
            ))
        })?;

        Ok(status.code().unwrap_or(-1))
    }

    /// Like [`Self::run_manage_command`], but any non-zero exit is an error.
    fn run_manage_checked(&self, cmd: &str, params: &[&str], envs: &[(&str, &str)]) -> Result<()> {
        match self.run_manage_command(cmd, params, envs)? {
            0 => Ok(()),
            code => Err(SiteError::manage(format!("{cmd} exited with code {code}"))),
        }
    }

    /// Template substitution values for this site.
    pub fn template_vars(&self) -> Result<TemplateVars> {
        let domain = required_str(&self.domain_name, "a domain name")?;
        let site_root = required_str(&self.site_root, "a site root")?;

        let rbsite = std::env::current_exe()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "rb-site".to_string());

        Ok(TemplateVars {
            rbsite,
            sitedir: self.abs_install_dir.display().to_string().replace('\\', "/"),
            sitedomain: domain.to_string(),
            sitedomain_escaped: domain.replace('.', "\\."),
            siteid: self.site_id.clone(),
            siteroot: site_root.to_string(),
        })
    }

    /// Path of the management interface executable.
    fn manage_path(&self) -> PathBuf {
        self.manage_override
            .clone()
            .unwrap_or_else(|| self.abs_install_dir.join("conf").join("manage"))
    }

    /// Copy or symlink one bundled tree into the site.
    fn link_bundled_dir(&self, src_rel: &str, dest_rel: &Path) -> Result<()> {
        let src_dir = self.bundled_data_dir.join(src_rel);
        let dest_dir = self.install_dir.join(dest_rel);

        if !src_dir.is_dir() {
            return Err(SiteError::general(format!(
                "Unable to find the bundled media path {}.",
                src_dir.display()
            )));
        }

        // A dangling symlink reports !exists() but still occupies the name.
        if dest_dir.symlink_metadata().is_ok() {
            if dest_dir.symlink_metadata()?.file_type().is_symlink() {
                fs::remove_file(&dest_dir)?;
            } else {
                fs::remove_dir_all(&dest_dir)?;
            }
        }

        if self.copy_media {
            copy_tree(&src_dir, &dest_dir)?;
        } else {
            symlink_dir(&src_dir, &dest_dir)?;
        }

        Ok(())
    }

    /// `.htaccess` enabling compression and long expiry for static media.
    fn write_media_htaccess(&self, media_dir: &Path) -> Result<()> {
        let mut contents = String::new();
        contents.push_str("<IfModule mod_expires.c>\n");
        contents.push_str("  <FilesMatch \"\\.(jpg|gif|png|css|js|htc)\">\n");
        contents.push_str("    ExpiresActive on\n");
        contents.push_str("    ExpiresDefault \"access plus 1 year\"\n");
        contents.push_str("  </FilesMatch>\n");
        contents.push_str("</IfModule>\n");
        contents.push('\n');
        contents.push_str("<IfModule mod_deflate.c>\n");

        for mimetype in [
            "text/html",
            "text/plain",
            "text/xml",
            "text/css",
            "text/javascript",
            "application/javascript",
            "application/x-javascript",
        ] {
            contents.push_str(&format!("  AddOutputFilterByType DEFLATE {mimetype}\n"));
        }

        contents.push_str("</IfModule>\n");

        fs::write(media_dir.join(".htaccess"), contents)?;
        Ok(())
    }

    /// Write `conf/settings_local.json` with the database, cache and site
    /// settings plus a freshly generated secret key.
    fn write_settings_file(&self, conf_dir: &Path) -> Result<()> {
        let db_type = required(self.db_type, "a database type")?;
        let db_name = required_str(&self.db_name, "a database name")?;
        let cache_info = required_str(&self.cache_info, "a cache identifier")?;
        let site_root = required_str(&self.site_root, "a site root")?;

        let server_fields = !db_type.is_file_backed();
        let settings = SiteSettings {
            database: DatabaseSettings {
                engine: db_type.engine(),
                name: db_name,
                user: server_fields.then(|| self.db_user.as_deref().unwrap_or("")),
                password: server_fields.then(|| self.db_pass.as_deref().unwrap_or("")),
                host: server_fields.then(|| self.db_host.as_deref().unwrap_or("")),
                port: server_fields.then(|| self.db_port.as_deref().unwrap_or("")),
            },
            secret_key: generate_secret_key(),
            cache_backend: cache_info,
            site_id: 1,
            site_root,
            force_script_name: "",
            debug: false,
        };

        let mut json = serde_json::to_string_pretty(&settings)?;
        json.push('\n');
        fs::write(conf_dir.join("settings_local.json"), json)?;
        Ok(())
    }
}

/// Site-specific settings consumed by the generated application.
#[derive(Serialize)]
struct SiteSettings<'a> {
    database: DatabaseSettings<'a>,
    secret_key: String,
    cache_backend: &'a str,
    site_id: u32,
    site_root: &'a str,
    force_script_name: &'static str,
    debug: bool,
}

#[derive(Serialize)]
struct DatabaseSettings<'a> {
    engine: &'static str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<&'a str>,
}

/// A 50-character secret for the generated settings file.
fn generate_secret_key() -> String {
    let mut rng = rand::thread_rng();
    (0..50)
        .map(|_| SECRET_KEY_CHARS[rng.gen_range(0..SECRET_KEY_CHARS.len())] as char)
        .collect()
}

fn required<T: Copy>(field: Option<T>, what: &str) -> Result<T> {
    field.ok_or_else(|| SiteError::validation(format!("{what} is required")))
}

fn required_str<'a>(field: &'a Option<String>, what: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| SiteError::validation(format!("{what} is required")))
}

/// Create a directory, but only if it doesn't already exist.
fn mkdir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_world_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_world_writable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dest: &Path) -> Result<()> {
    std::os::unix::fs::symlink(src, dest)?;
    Ok(())
}

#[cfg(windows)]
fn symlink_dir(src: &Path, dest: &Path) -> Result<()> {
    std::os::windows::fs::symlink_dir(src, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture_data_dir(root: &Path) -> PathBuf {
        let data = root.join("data");
        for dir in [
            "htdocs/errordocs",
            "htdocs/media/admin",
            "htdocs/media/rb",
            "htdocs/media/djblets",
        ] {
            fs::create_dir_all(data.join(dir)).unwrap();
        }
        fs::write(data.join("htdocs/errordocs/500.html"), "oops").unwrap();
        data
    }

    fn test_site(root: &Path) -> Site {
        let mut site = Site::new(&root.join("reviews")).unwrap();
        site.bundled_data_dir = fixture_data_dir(root);
        site.copy_media = true;
        site
    }

    #[test]
    fn test_site_id_derivation() {
        let site = Site::new(Path::new("/var/www/reviews.example.com")).unwrap();
        assert_eq!(site.site_id, "reviews_example_com");

        let site = Site::new(Path::new("/srv/my site")).unwrap();
        assert_eq!(site.site_id, "my_site");
    }

    #[test]
    fn test_rebuild_creates_hierarchy() {
        let tmp = TempDir::new().unwrap();
        let mut site = test_site(tmp.path());
        site.db_type = Some(DbType::Sqlite3);

        site.rebuild_site_directory().unwrap();

        let root = tmp.path().join("reviews");
        for dir in ["logs", "conf", "tmp", "db", "htdocs/media/uploaded/images"] {
            assert!(root.join(dir).is_dir(), "missing {dir}");
        }
        assert!(root.join("htdocs/errordocs/500.html").is_file());
        assert!(root.join("htdocs/media/.htaccess").is_file());
    }

    #[test]
    fn test_rebuild_skips_db_dir_for_server_databases() {
        let tmp = TempDir::new().unwrap();
        let mut site = test_site(tmp.path());
        site.db_type = Some(DbType::Mysql);

        site.rebuild_site_directory().unwrap();
        assert!(!tmp.path().join("reviews/db").exists());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let site = test_site(tmp.path());

        site.rebuild_site_directory().unwrap();
        site.rebuild_site_directory().unwrap();
    }

    #[test]
    fn test_rebuild_fails_without_bundled_media() {
        let tmp = TempDir::new().unwrap();
        let mut site = Site::new(&tmp.path().join("reviews")).unwrap();
        site.bundled_data_dir = tmp.path().join("nowhere");

        let err = site.rebuild_site_directory().unwrap_err();
        assert!(err.to_string().contains("bundled media path"));
    }

    #[test]
    fn test_generate_config_files_sqlite() {
        let tmp = TempDir::new().unwrap();
        let mut site = test_site(tmp.path());
        site.domain_name = Some("reviews.example.com".to_string());
        site.site_root = Some("/".to_string());
        site.db_type = Some(DbType::Sqlite3);
        site.db_name = Some("/var/www/reviews/db/reviewboard.db".to_string());
        site.cache_info = Some("memcached://localhost:11211/".to_string());
        site.web_server_type = Some(WebServerType::Lighttpd);

        site.rebuild_site_directory().unwrap();
        site.generate_config_files().unwrap();

        let conf_dir = tmp.path().join("reviews/conf");
        let web_conf = fs::read_to_string(conf_dir.join("lighttpd.conf")).unwrap();
        assert!(web_conf.contains("reviews\\.example\\.com"));
        assert!(!web_conf.contains('@'));

        let settings = fs::read_to_string(conf_dir.join("settings_local.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&settings).unwrap();
        assert_eq!(parsed["database"]["engine"], "sqlite3");
        // Server connection fields are omitted for file-backed databases
        assert!(parsed["database"].get("host").is_none());
        assert_eq!(parsed["secret_key"].as_str().unwrap().len(), 50);

        // lighttpd serves through FastCGI
        assert!(tmp.path().join("reviews/htdocs/reviewboard.fcgi").is_file());
    }

    #[test]
    fn test_generate_config_files_requires_loader_for_apache() {
        let tmp = TempDir::new().unwrap();
        let mut site = test_site(tmp.path());
        site.domain_name = Some("reviews.example.com".to_string());
        site.site_root = Some("/".to_string());
        site.web_server_type = Some(WebServerType::Apache);

        site.rebuild_site_directory().unwrap();
        let err = site.generate_config_files().unwrap_err();
        assert!(matches!(err, SiteError::Validation(_)));
    }

    #[test]
    fn test_create_admin_user_requires_password() {
        let tmp = TempDir::new().unwrap();
        let mut site = test_site(tmp.path());
        site.admin_user = Some("admin".to_string());
        site.admin_email = Some("admin@example.com".to_string());

        let err = site.create_admin_user().unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_manage_command_reports_unrunnable_interface() {
        let tmp = TempDir::new().unwrap();
        let mut site = test_site(tmp.path());
        site.manage_override = Some(tmp.path().join("no-such-manage"));

        let err = site.sync_database().unwrap_err();
        assert!(matches!(err, SiteError::Manage(_)));
    }

    #[test]
    fn test_secret_key_shape() {
        let key = generate_secret_key();
        assert_eq!(key.len(), 50);
        assert!(key.bytes().all(|b| SECRET_KEY_CHARS.contains(&b)));
    }

    #[test]
    fn test_template_vars_require_domain() {
        let site = Site::new(Path::new("/tmp/reviews")).unwrap();
        assert!(site.template_vars().is_err());
    }
}
