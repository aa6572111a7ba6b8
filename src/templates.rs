//! Generated configuration templates
//!
//! Web server and cron configuration files are generated from templates
//! embedded in the binary. Templates use `@identifier@` placeholders drawn
//! from a fixed key set; rendering fails on an unknown placeholder rather
//! than writing a broken configuration file.

use crate::error::{Result, SiteError};
use crate::types::{PythonLoader, WebServerType};

pub const APACHE_MODPYTHON_CONF: &str = include_str!("../templates/apache-modpython.conf.in");
pub const APACHE_FASTCGI_CONF: &str = include_str!("../templates/apache-fastcgi.conf.in");
pub const LIGHTTPD_CONF: &str = include_str!("../templates/lighttpd.conf.in");
pub const SEARCH_CRON_CONF: &str = include_str!("../templates/search-cron.conf.in");
pub const FCGI_SCRIPT: &str = include_str!("../templates/reviewboard.fcgi.in");

/// Values substituted into `@identifier@` placeholders.
#[derive(Debug, Clone)]
pub struct TemplateVars {
    /// How to invoke this installer (used in generated cron entries).
    pub rbsite: String,
    /// Absolute site directory, path separators normalized to `/`.
    pub sitedir: String,
    pub sitedomain: String,
    /// Domain with dots escaped, for regex contexts.
    pub sitedomain_escaped: String,
    /// Identifier derived from the install directory's base name.
    pub siteid: String,
    pub siteroot: String,
}

impl TemplateVars {
    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "rbsite" => Some(&self.rbsite),
            "sitedir" => Some(&self.sitedir),
            "sitedomain" => Some(&self.sitedomain),
            "sitedomain_escaped" => Some(&self.sitedomain_escaped),
            "siteid" => Some(&self.siteid),
            "siteroot" => Some(&self.siteroot),
            _ => None,
        }
    }
}

/// Web server configuration selected from the site's server and loader.
pub struct WebServerConf {
    /// File name the rendered configuration is written under in `conf/`.
    pub filename: &'static str,
    pub contents: &'static str,
    /// Whether the FastCGI entry point must also be generated.
    pub enables_fastcgi: bool,
}

/// Pick the web server template for a server/loader combination.
pub fn web_server_conf(
    server: WebServerType,
    loader: Option<PythonLoader>,
) -> Result<WebServerConf> {
    match server {
        WebServerType::Apache => match loader {
            Some(PythonLoader::Modpython) => Ok(WebServerConf {
                filename: "apache-modpython.conf",
                contents: APACHE_MODPYTHON_CONF,
                enables_fastcgi: false,
            }),
            Some(PythonLoader::Fastcgi) => Ok(WebServerConf {
                filename: "apache-fastcgi.conf",
                contents: APACHE_FASTCGI_CONF,
                enables_fastcgi: true,
            }),
            None => Err(SiteError::validation(
                "a python loader is required for apache",
            )),
        },
        WebServerType::Lighttpd => Ok(WebServerConf {
            filename: "lighttpd.conf",
            contents: LIGHTTPD_CONF,
            enables_fastcgi: true,
        }),
    }
}

/// Substitute every `@identifier@` placeholder in `template`.
///
/// Identifiers are lowercase letters and underscores. A `@` that does not
/// open a well-formed placeholder is copied through verbatim; a well-formed
/// placeholder with an unknown identifier is an error.
pub fn render(template: &str, vars: &TemplateVars) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('@') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let end = after
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_lowercase() || *c == '_'))
            .map(|(i, _)| i);

        match end {
            Some(end) if end > 0 && after[end..].starts_with('@') => {
                let key = &after[..end];
                match vars.lookup(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(SiteError::template(format!(
                            "unknown placeholder @{key}@"
                        )));
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('@');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars {
            rbsite: "/usr/bin/rb-site".to_string(),
            sitedir: "/var/www/reviews".to_string(),
            sitedomain: "reviews.example.com".to_string(),
            sitedomain_escaped: "reviews\\.example\\.com".to_string(),
            siteid: "reviews".to_string(),
            siteroot: "/".to_string(),
        }
    }

    #[test]
    fn test_render_substitutes_known_keys() {
        let out = render("ServerName @sitedomain@\nroot @sitedir@/htdocs\n", &vars()).unwrap();
        assert_eq!(
            out,
            "ServerName reviews.example.com\nroot /var/www/reviews/htdocs\n"
        );
    }

    #[test]
    fn test_render_rejects_unknown_placeholder() {
        let err = render("path @no_such_key@", &vars()).unwrap_err();
        assert!(err.to_string().contains("@no_such_key@"));
    }

    #[test]
    fn test_render_leaves_stray_at_signs() {
        let out = render("admin@example.com uses @@ and @Upper@", &vars()).unwrap();
        assert_eq!(out, "admin@example.com uses @@ and @Upper@");
    }

    #[test]
    fn test_embedded_templates_render_cleanly() {
        let v = vars();
        for template in [
            APACHE_MODPYTHON_CONF,
            APACHE_FASTCGI_CONF,
            LIGHTTPD_CONF,
            SEARCH_CRON_CONF,
            FCGI_SCRIPT,
        ] {
            let out = render(template, &v).unwrap();
            assert!(!out.contains("@sitedir@"));
        }
    }

    #[test]
    fn test_web_server_conf_selection() {
        let conf = web_server_conf(WebServerType::Apache, Some(PythonLoader::Modpython)).unwrap();
        assert_eq!(conf.filename, "apache-modpython.conf");
        assert!(!conf.enables_fastcgi);

        let conf = web_server_conf(WebServerType::Lighttpd, None).unwrap();
        assert_eq!(conf.filename, "lighttpd.conf");
        assert!(conf.enables_fastcgi);

        assert!(web_server_conf(WebServerType::Apache, None).is_err());
    }
}
