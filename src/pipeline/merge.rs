use crate::core::errors::{BugxError, BugxResult};
use crate::core::models::ArtifactKind;
use crate::utils::fs::atomic_write;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static STATIC_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(png|jpg|jpeg|gif|css|js|woff|ttf|eot|svg|ico)(\?.*)?$")
        .expect("static asset pattern is valid")
});

/// Reads a list artifact; a file that was never written counts as empty.
fn read_list(path: &Path) -> BugxResult<Vec<u8>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(BugxError::merge(path, e)),
    }
}

fn write_lines<'a>(lines: impl IntoIterator<Item = &'a [u8]>, output: &Path) -> BugxResult<usize> {
    let mut buf = Vec::new();
    let mut count = 0;
    for line in lines {
        buf.extend_from_slice(line);
        buf.push(b'\n');
        count += 1;
    }
    atomic_write(output, &buf).map_err(|e| BugxError::merge(output, e))?;
    Ok(count)
}

/// Union of the lines of `inputs`, in first-seen order.
///
/// Lines are trimmed; blank lines and exact duplicates are dropped. Returns
/// the number of lines written to `output`.
pub fn merge_artifacts(inputs: &[PathBuf], output: &Path) -> BugxResult<usize> {
    let contents = inputs
        .iter()
        .map(|p| read_list(p))
        .collect::<BugxResult<Vec<_>>>()?;

    let mut seen: HashSet<&[u8]> = HashSet::new();
    let mut merged: Vec<&[u8]> = Vec::new();
    for content in &contents {
        for line in content.split(|&b| b == b'\n').map(<[u8]>::trim_ascii) {
            if !line.is_empty() && seen.insert(line) {
                merged.push(line);
            }
        }
    }

    let count = write_lines(merged, output)?;
    tracing::debug!("Merged {} artifacts into {:?} ({} lines)", inputs.len(), output, count);
    Ok(count)
}

/// Normalizes a URL list for scanners.
///
/// Static-asset extensions (and any query after them) are cut off, lines
/// that are not http(s) URLs are dropped, blank-valued query parameters are
/// removed and the rest sorted by name, fragments are stripped. The unique
/// results are written sorted.
pub fn clean_urls(input: &Path, output: &Path) -> BugxResult<usize> {
    let content = read_list(input)?;
    let text = String::from_utf8_lossy(&content);

    let cleaned: BTreeSet<String> = text
        .lines()
        .map(|line| STATIC_ASSET.replace(line.trim(), ""))
        .filter(|line| !line.is_empty())
        .filter_map(|line| normalize_url(&line))
        .collect();

    let count = write_lines(cleaned.iter().map(|s| s.as_bytes()), output)?;
    tracing::debug!("Cleaned {:?}: {} unique URLs", input, count);
    Ok(count)
}

fn normalize_url(raw: &str) -> Option<String> {
    let mut url = url::Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        // Stable, so repeated keys keep their order.
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs);
        }
    }
    Some(url.to_string())
}

/// First `limit` non-blank lines of `input`.
pub fn head_lines(input: &Path, limit: usize, output: &Path) -> BugxResult<usize> {
    let content = read_list(input)?;
    let lines = content
        .split(|&b| b == b'\n')
        .map(<[u8]>::trim_ascii)
        .filter(|line| !line.is_empty())
        .take(limit);
    write_lines(lines, output)
}

/// Zero-byte stand-in for an artifact that never materialized.
pub fn write_placeholder(path: &Path) -> BugxResult<()> {
    atomic_write(path, b"").map_err(|e| BugxError::merge(path, e))
}

/// Number of records in an artifact: entries of a directory, elements of a
/// JSON array document, otherwise non-blank lines (JSON lines included).
pub fn count_records(path: &Path, kind: ArtifactKind) -> io::Result<usize> {
    if kind == ArtifactKind::Directory {
        return Ok(std::fs::read_dir(path)?.count());
    }
    let content = std::fs::read(path)?;
    if kind == ArtifactKind::JsonFindings && content.trim_ascii_start().starts_with(b"[") {
        if let Ok(serde_json::Value::Array(items)) = serde_json::from_slice(&content) {
            return Ok(items.len());
        }
    }
    Ok(content
        .split(|&b| b == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
        .count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn lines_of(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_union_keeps_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "a\nb\n").unwrap();
        fs::write(&b, "b\nc\n").unwrap();
        let out = dir.path().join("merged.txt");

        let count = merge_artifacts(&[a, b], &out).unwrap();
        assert_eq!(count, 3);
        assert_eq!(lines_of(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blank_lines_and_whitespace_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "\n  x.example.com  \n\n\t\ny.example.com\r\n").unwrap();
        fs::write(&b, "x.example.com\nX.example.com\n").unwrap();
        let out = dir.path().join("merged.txt");

        merge_artifacts(&[a, b], &out).unwrap();
        // No case folding at merge time.
        assert_eq!(
            lines_of(&out),
            vec!["x.example.com", "y.example.com", "X.example.com"]
        );
    }

    #[test]
    fn test_missing_inputs_count_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.txt");
        fs::write(&present, "only\n").unwrap();
        let out = dir.path().join("merged.txt");

        let count = merge_artifacts(&[dir.path().join("never-written.txt"), present], &out).unwrap();
        assert_eq!(count, 1);

        let empty_out = dir.path().join("empty.txt");
        assert_eq!(merge_artifacts(&[], &empty_out).unwrap(), 0);
        assert!(empty_out.exists());
        assert_eq!(fs::metadata(&empty_out).unwrap().len(), 0);
    }

    #[test]
    fn test_unreadable_input_is_merge_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a list.
        let err = merge_artifacts(&[dir.path().to_path_buf()], &dir.path().join("out.txt"))
            .unwrap_err();
        assert!(matches!(err, BugxError::ArtifactMerge { .. }));
    }

    #[test]
    fn test_clean_urls() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urls.txt");
        fs::write(
            &input,
            "https://example.com/search?q=1&a=2#frag\n\
             https://example.com/logo.PNG\n\
             https://example.com/app.js?v=3\n\
             https://example.com/search?a=2&q=1\n\
             not a url\n\
             http://example.com/item?id=5&debug=\n\
             https://example.com/page?flag\n",
        )
        .unwrap();
        let out = dir.path().join("clean.txt");

        let count = clean_urls(&input, &out).unwrap();
        assert_eq!(count, 5);
        assert_eq!(
            lines_of(&out),
            vec![
                "http://example.com/item?id=5",
                "https://example.com/app",
                "https://example.com/logo",
                "https://example.com/page",
                "https://example.com/search?a=2&q=1",
            ]
        );
    }

    #[test]
    fn test_clean_urls_keeps_repeated_keys_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urls.txt");
        fs::write(&input, "https://example.com/?z=1&id=2&id=1\n").unwrap();
        let out = dir.path().join("clean.txt");

        clean_urls(&input, &out).unwrap();
        assert_eq!(lines_of(&out), vec!["https://example.com/?id=2&id=1&z=1"]);
    }

    #[test]
    fn test_count_records_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts.txt");
        fs::write(&hosts, "a.example.com\n\n  \nb.example.com\n").unwrap();
        assert_eq!(count_records(&hosts, ArtifactKind::HostList).unwrap(), 2);

        let jsonl = dir.path().join("nuclei.json");
        fs::write(&jsonl, "{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n").unwrap();
        assert_eq!(count_records(&jsonl, ArtifactKind::JsonFindings).unwrap(), 3);

        let array = dir.path().join("dalfox.json");
        fs::write(&array, "[\n  {\"poc\": 1},\n  {\"poc\": 2}\n]\n").unwrap();
        assert_eq!(count_records(&array, ArtifactKind::JsonFindings).unwrap(), 2);

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "[]").unwrap();
        assert_eq!(count_records(&empty, ArtifactKind::JsonFindings).unwrap(), 0);

        let shots = dir.path().join("gowitness");
        fs::create_dir(&shots).unwrap();
        fs::write(shots.join("a.png"), b"x").unwrap();
        assert_eq!(count_records(&shots, ArtifactKind::Directory).unwrap(), 1);

        assert!(count_records(&dir.path().join("missing.txt"), ArtifactKind::Text).is_err());
    }

    #[test]
    fn test_head_lines() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urls.txt");
        fs::write(&input, "1\n\n2\n3\n4\n").unwrap();
        let out = dir.path().join("head.txt");
        assert_eq!(head_lines(&input, 2, &out).unwrap(), 2);
        assert_eq!(lines_of(&out), vec!["1", "2"]);
    }
}
