//! Normalization rules for wizard answers
//!
//! Each function takes the raw answer exactly as typed and produces the
//! canonical stored form. These run once per confirmed answer on the console
//! and on every edit event in the full-screen wizard, so they must be
//! idempotent.

/// Force a site root path to start and end with `/`.
pub fn root_url_path(path: &str) -> String {
    let mut path = path.to_string();

    if !path.ends_with('/') {
        path.push('/');
    }

    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    path
}

/// Force a media URL path to end with `/` and not start with `/`.
///
/// The path is relative to the site root. A full URL with a scheme prefix
/// points at a separate media server and is stored unmodified.
pub fn media_url_path(path: &str) -> String {
    if path.contains("://") {
        return path.to_string();
    }

    let mut path = path.to_string();

    if !path.ends_with('/') {
        path.push('/');
    }

    if let Some(stripped) = path.strip_prefix('/') {
        path = stripped.to_string();
    }

    path
}

/// Split a `host:port` answer on the first `:`.
///
/// Returns the host and, when present, the port.
pub fn split_host_port(value: &str) -> (String, Option<String>) {
    match value.split_once(':') {
        Some((host, port)) => (host.to_string(), Some(port.to_string())),
        None => (value.to_string(), None),
    }
}

/// Store a file-cache directory with the URI-style prefix the generated
/// application expects.
pub fn file_cache_info(dir: &str) -> String {
    format!("file://{dir}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_path_gains_both_slashes() {
        assert_eq!(root_url_path("reviews"), "/reviews/");
        assert_eq!(root_url_path("/reviews"), "/reviews/");
        assert_eq!(root_url_path("reviews/"), "/reviews/");
        assert_eq!(root_url_path("/"), "/");
    }

    #[test]
    fn test_media_url_is_relative() {
        assert_eq!(media_url_path("media"), "media/");
        assert_eq!(media_url_path("/media"), "media/");
        assert_eq!(media_url_path("media/"), "media/");
    }

    #[test]
    fn test_media_url_absolute_kept_verbatim() {
        assert_eq!(
            media_url_path("http://cdn.example.com/media"),
            "http://cdn.example.com/media"
        );
    }

    #[test]
    fn test_host_port_split() {
        assert_eq!(
            split_host_port("db.example.com:5555"),
            ("db.example.com".to_string(), Some("5555".to_string()))
        );
        assert_eq!(split_host_port("localhost"), ("localhost".to_string(), None));
        // Only the first colon splits
        assert_eq!(
            split_host_port("host:55:66"),
            ("host".to_string(), Some("55:66".to_string()))
        );
    }

    #[test]
    fn test_file_cache_prefix() {
        assert_eq!(file_cache_info("/tmp/reviewboard_cache"), "file:///tmp/reviewboard_cache");
    }

    mod properties {
        use super::super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn root_path_always_delimited(s in "[a-zA-Z0-9/._-]{0,24}") {
                let out = root_url_path(&s);
                prop_assert!(out.starts_with('/'));
                prop_assert!(out.ends_with('/'));
                // Idempotent
                prop_assert_eq!(root_url_path(&out), out.clone());
            }

            #[test]
            fn relative_media_url_never_absolute(s in "[a-zA-Z0-9._-][a-zA-Z0-9._/-]{0,23}") {
                let out = media_url_path(&s);
                prop_assert!(!out.starts_with('/'));
                prop_assert!(out.ends_with('/'));
            }
        }
    }
}
