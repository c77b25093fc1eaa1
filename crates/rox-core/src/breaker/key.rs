use anyhow::{Context, Result};
use std::path::Path;

/// Stable breaker keys for the three kinds of target we wrap.
///
/// URLs are normalised down to `(scheme, host, port)` so that different
/// paths on the same origin share one failure history. Filesystem targets are
/// keyed by containing directory.
pub struct TargetKey;

impl TargetKey {
    /// `http:<scheme>://<host>:<port>` for a URL.
    pub fn for_url(url: &str) -> Result<String> {
        let parsed =
            url::Url::parse(url).with_context(|| format!("invalid URL for breaker target: {url}"))?;

        let scheme = parsed.scheme();
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("URL missing host for breaker target: {url}"))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| anyhow::anyhow!("URL missing port and unknown default: {url}"))?;

        Ok(format!("http:{scheme}://{host}:{port}"))
    }

    /// `fs:<dir>` where `dir` is the absolute directory containing `path`.
    ///
    /// The directory is canonicalised when it exists, so relative and
    /// absolute spellings of one directory share a breaker; otherwise it is
    /// joined onto the current directory.
    pub fn for_path(path: &Path) -> String {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = std::fs::canonicalize(dir)
            .or_else(|_| std::env::current_dir().map(|cwd| cwd.join(dir)))
            .unwrap_or_else(|_| dir.to_path_buf());
        format!("fs:{}", dir.display())
    }

    /// `cache:<name>` for a named index cache.
    pub fn for_cache(name: &str) -> String {
        format!("cache:{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_key_parses_scheme_host_port() {
        let key = TargetKey::for_url("https://example.com:8443/path").unwrap();
        assert_eq!(key, "http:https://example.com:8443");
    }

    #[test]
    fn url_key_uses_default_port_and_ignores_path() {
        let a = TargetKey::for_url("http://example.com/a?x=1").unwrap();
        let b = TargetKey::for_url("http://example.com/b").unwrap();
        assert_eq!(a, "http:http://example.com:80");
        assert_eq!(a, b);
    }

    #[test]
    fn url_key_rejects_garbage() {
        assert!(TargetKey::for_url("not a url").is_err());
    }

    #[test]
    fn path_key_uses_parent_dir() {
        assert_eq!(
            TargetKey::for_path(Path::new("/nonexistent-rox/data/file.bin")),
            "fs:/nonexistent-rox/data"
        );
    }

    #[test]
    fn relative_and_absolute_paths_share_a_key() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(
            TargetKey::for_path(Path::new("file.bin")),
            TargetKey::for_path(&cwd.join("file.bin"))
        );
        assert!(TargetKey::for_path(Path::new("file.bin")).starts_with("fs:/"));

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        assert_eq!(
            TargetKey::for_path(&dir.path().join("b/../b/x.bin")),
            TargetKey::for_path(&dir.path().join("b/x.bin"))
        );
    }

    #[test]
    fn cache_key() {
        assert_eq!(TargetKey::for_cache("collections"), "cache:collections");
    }
}
