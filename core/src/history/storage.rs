use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::job::JobRecord;

/// Reads every stored job record. A missing file is an empty history.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<JobRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read job history file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse job history file: {}", path.display()))
}

/// Replaces the stored records. The new content is written next to the
/// history file and renamed over it, so readers never see a partial file.
pub fn save_records(path: &Path, records: &[JobRecord]) -> anyhow::Result<()> {
    let content =
        serde_json::to_vec_pretty(records).context("Failed to serialize job records")?;
    write_atomic(path, &content)
        .with_context(|| format!("Failed to write job history file: {}", path.display()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    if let Err(e) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::BuildJob;
    use crate::resolver::BuildConfig;

    fn record(id: &str) -> JobRecord {
        BuildJob::new(BuildConfig::new()).with_job_id(id).to_record()
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.json");

        save_records(&path, &[record("1"), record("2")]).unwrap();

        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("jobs.json")]);

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].job_id.as_deref(), Some("2"));
    }

    #[test]
    fn test_save_replaces_previous_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        save_records(&path, &[record("1"), record("2")]).unwrap();
        save_records(&path, &[record("3")]).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].job_id.as_deref(), Some("3"));
    }

    #[test]
    fn test_empty_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        fs::write(&path, "").unwrap();
        assert!(load_records(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        fs::write(&path, "[{").unwrap();
        assert!(load_records(&path).is_err());
    }
}
