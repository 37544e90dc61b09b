use super::errors::{BugxError, BugxResult};
use super::models::FocusMode;
use serde::Serialize;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

/// A validated, canonicalized scan target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Target {
    pub raw: String,
    pub kind: FocusMode,
    /// Lowercased domain, the URL as given, the IP/CIDR, or the file path.
    pub canonical: String,
    /// Bare host for domain/URL/network targets; `None` for files.
    pub host: Option<String>,
    pub slug: String,
}

impl Target {
    /// URL-prefixed form used by tools that want a base URL.
    pub fn url(&self) -> Option<String> {
        match self.kind {
            FocusMode::Url => Some(self.canonical.trim_end_matches('/').to_string()),
            FocusMode::Domain => self.host.as_ref().map(|h| format!("https://{}", h)),
            FocusMode::Network => {
                if self.canonical.contains('/') {
                    None
                } else {
                    Some(format!("http://{}", self.canonical))
                }
            }
            FocusMode::File => None,
        }
    }

    pub fn file(&self) -> Option<&Path> {
        match self.kind {
            FocusMode::File => Some(Path::new(&self.canonical)),
            _ => None,
        }
    }
}

/// Validates `raw` against `mode` and derives the canonical forms.
pub fn normalize(raw: &str, mode: FocusMode) -> BugxResult<Target> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(BugxError::invalid_target(raw, "target is empty"));
    }

    let (canonical, host) = match mode {
        FocusMode::Domain => {
            validate_domain(trimmed)?;
            let domain = trimmed.trim_end_matches('.').to_ascii_lowercase();
            (domain.clone(), Some(domain))
        }
        FocusMode::Url => {
            let parsed = url::Url::parse(trimmed)
                .map_err(|e| BugxError::invalid_target(raw, format!("not a URL: {}", e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(BugxError::invalid_target(raw, "URL scheme must be http or https"));
            }
            let host = parsed
                .host_str()
                .ok_or_else(|| BugxError::invalid_target(raw, "URL has no host"))?
                .to_ascii_lowercase();
            (trimmed.to_string(), Some(host))
        }
        FocusMode::Network => {
            validate_network(trimmed)?;
            (trimmed.to_string(), Some(trimmed.to_string()))
        }
        FocusMode::File => {
            validate_file(raw, Path::new(trimmed))?;
            (trimmed.to_string(), None)
        }
    };

    Ok(Target {
        raw: raw.to_string(),
        kind: mode,
        canonical,
        host,
        slug: slug(trimmed),
    })
}

/// Picks a mode for `raw` and normalizes it.
pub fn normalize_auto(raw: &str) -> BugxResult<Target> {
    normalize(raw, classify(raw))
}

pub fn classify(raw: &str) -> FocusMode {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        FocusMode::Url
    } else if validate_network(trimmed).is_ok() {
        FocusMode::Network
    } else if Path::new(trimmed).is_file() {
        FocusMode::File
    } else {
        FocusMode::Domain
    }
}

/// Filesystem-safe identifier for a target's output directory.
///
/// Distinct hosts that share a first label (`example.com`, `example.org`)
/// collide; callers accept that.
pub fn slug(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();
    for scheme in ["http://", "https://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    if let Some(idx) = s.find('/') {
        s.truncate(idx);
    }
    if let Some(idx) = s.find('.') {
        s.truncate(idx);
    }

    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        "target".to_string()
    } else {
        cleaned
    }
}

fn validate_domain(raw: &str) -> BugxResult<()> {
    if raw.chars().any(char::is_whitespace) {
        return Err(BugxError::invalid_target(raw, "domain contains whitespace"));
    }
    if raw.contains('/') || raw.contains('\\') {
        return Err(BugxError::invalid_target(raw, "domain contains a path separator"));
    }
    if let Some(bad) = raw
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')))
    {
        return Err(BugxError::invalid_target(
            raw,
            format!("unexpected character '{}' in domain", bad),
        ));
    }
    let labels = raw.trim_end_matches('.');
    if labels.is_empty() || labels.split('.').any(str::is_empty) {
        return Err(BugxError::invalid_target(raw, "domain has an empty label"));
    }
    Ok(())
}

fn validate_network(raw: &str) -> BugxResult<()> {
    let (addr, prefix) = match raw.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (raw, None),
    };

    let ip = IpAddr::from_str(addr)
        .map_err(|_| BugxError::invalid_target(raw, "not an IP address or CIDR"))?;

    if let Some(prefix) = prefix {
        let bits: u8 = prefix
            .parse()
            .map_err(|_| BugxError::invalid_target(raw, "CIDR prefix is not a number"))?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if bits > max {
            return Err(BugxError::invalid_target(
                raw,
                format!("CIDR prefix /{} exceeds /{}", bits, max),
            ));
        }
    }
    Ok(())
}

fn validate_file(raw: &str, path: &Path) -> BugxResult<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| BugxError::invalid_target(raw, "file does not exist"))?;
    if !metadata.is_file() {
        return Err(BugxError::invalid_target(raw, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(BugxError::invalid_target(raw, "file is empty"));
    }
    Ok(())
}

/// Reads a targets file: one target per line, blanks and `#` comments skipped.
pub fn read_targets_file(path: &Path) -> BugxResult<Vec<String>> {
    validate_file(&path.display().to_string(), path)?;
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::io::Write;

    #[rstest]
    #[case("https://www.example.com/path", "example")]
    #[case("example.com", "example")]
    #[case("http://Example.COM", "example")]
    #[case("www.test-site.io", "test_site")]
    #[case("sub.domain.example.com", "sub")]
    #[case("", "target")]
    #[case("https://", "target")]
    #[case("10.0.0.1", "10")]
    fn test_slug_cases(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(slug(raw), expected);
    }

    #[test]
    fn test_normalize_domain() {
        let target = normalize("Example.com", FocusMode::Domain).unwrap();
        assert_eq!(target.canonical, "example.com");
        assert_eq!(target.host.as_deref(), Some("example.com"));
        assert_eq!(target.url().as_deref(), Some("https://example.com"));
        assert_eq!(target.slug, "example");
    }

    #[rstest]
    #[case("exa mple.com")]
    #[case("example.com/admin")]
    #[case("https://example.com")]
    #[case("example..com")]
    #[case("exa;mple.com")]
    #[case("   ")]
    fn test_normalize_domain_rejects(#[case] raw: &str) {
        let err = normalize(raw, FocusMode::Domain).unwrap_err();
        assert!(matches!(err, BugxError::InvalidTarget { .. }));
    }

    #[test]
    fn test_normalize_url() {
        let target = normalize("https://www.Example.com/app/", FocusMode::Url).unwrap();
        assert_eq!(target.host.as_deref(), Some("www.example.com"));
        assert_eq!(target.url().as_deref(), Some("https://www.Example.com/app"));
        assert_eq!(target.slug, "example");
        assert!(normalize("ftp://example.com", FocusMode::Url).is_err());
    }

    #[test]
    fn test_normalize_network() {
        assert!(normalize("192.168.1.0/24", FocusMode::Network).is_ok());
        assert!(normalize("::1", FocusMode::Network).is_ok());
        assert!(normalize("10.0.0.0/33", FocusMode::Network).is_err());
        assert!(normalize("10.0.0.300", FocusMode::Network).is_err());
        let single = normalize("10.0.0.1", FocusMode::Network).unwrap();
        assert_eq!(single.url().as_deref(), Some("http://10.0.0.1"));
    }

    #[test]
    fn test_normalize_file() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, b"").unwrap();
        let err = normalize(empty.to_str().unwrap(), FocusMode::File).unwrap_err();
        assert!(err.to_string().contains("empty"));

        let missing = dir.path().join("missing.txt");
        assert!(normalize(missing.to_str().unwrap(), FocusMode::File).is_err());

        let hosts = dir.path().join("hosts.txt");
        let mut f = std::fs::File::create(&hosts).unwrap();
        writeln!(f, "a.example.com").unwrap();
        let target = normalize(hosts.to_str().unwrap(), FocusMode::File).unwrap();
        assert_eq!(target.file(), Some(hosts.as_path()));
        assert!(target.host.is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("https://example.com"), FocusMode::Url);
        assert_eq!(classify("10.1.2.0/24"), FocusMode::Network);
        assert_eq!(classify("example.com"), FocusMode::Domain);
    }

    #[test]
    fn test_read_targets_file_skips_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.txt");
        std::fs::write(&path, "# scope\nexample.com\n\n  test.org  \n").unwrap();
        let targets = read_targets_file(&path).unwrap();
        assert_eq!(targets, vec!["example.com", "test.org"]);
    }

    proptest! {
        #[test]
        fn prop_slug_is_safe_and_non_empty(domain in "[a-zA-Z0-9][a-zA-Z0-9-]{0,20}(\\.[a-zA-Z0-9-]{1,10}){0,3}") {
            let target = normalize(&domain, FocusMode::Domain).unwrap();
            prop_assert!(!target.slug.is_empty());
            prop_assert!(target.slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }

        #[test]
        fn prop_scheme_and_www_do_not_change_slug(domain in "[a-vx-z0-9][a-z0-9]{0,11}\\.[a-z]{2,6}", path in "(/[a-z0-9]{0,8}){0,2}") {
            let bare = slug(&domain);
            prop_assert_eq!(&slug(&format!("https://www.{}{}", domain, path)), &bare);
            prop_assert_eq!(&slug(&format!("http://{}{}", domain, path)), &bare);
            prop_assert_eq!(&slug(&format!("www.{}", domain)), &bare);
        }
    }
}
