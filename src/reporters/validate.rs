use anyhow::{bail, Result};
use std::fs;
use std::path::PathBuf;

pub fn validate_reports(files: &[PathBuf]) -> Result<()> {
    for file in files {
        if !file.exists() {
            bail!("Required report file missing: {:?}", file);
        }

        let metadata = fs::metadata(file)?;
        if metadata.len() == 0 {
            bail!("Report file is empty: {:?}", file);
        }
    }

    tracing::debug!("Validated {} report files", files.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_and_empty_reports_fail() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("summary.json");
        assert!(validate_reports(&[missing.clone()]).is_err());

        std::fs::write(&missing, b"").unwrap();
        let err = validate_reports(&[missing.clone()]).unwrap_err();
        assert!(err.to_string().contains("empty"));

        std::fs::write(&missing, b"{}").unwrap();
        assert!(validate_reports(&[missing]).is_ok());
    }
}
