//! Merges every incident array in a directory into a single array file.
//!
//! Used to build a static `incidents.json` for deployments that serve the
//! map without the storage API.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::StorageError;

/// Outcome of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Files whose records were included.
    pub files_merged: Vec<PathBuf>,
    /// Files that were not arrays or could not be parsed.
    pub files_skipped: Vec<PathBuf>,
    /// Total number of merged records.
    pub total: usize,
}

/// Concatenates the arrays of all `*.json` files in `dir`.
///
/// Files are visited in name order. Files that don't hold an array, or
/// can't be read or parsed, are skipped with a log line. `exclude` lets the
/// caller keep the output file out of its own input; it is compared by
/// canonical path, so `./data/out.json` and `data/out.json` match.
///
/// # Errors
///
/// Returns [`StorageError`] if the directory can't be listed.
pub async fn collect_dir(
    dir: &Path,
    exclude: Option<&Path>,
) -> Result<(Vec<Value>, MergeSummary), StorageError> {
    // An exclude that doesn't exist yet can't be listed either.
    let exclude = match exclude {
        Some(path) => tokio::fs::canonicalize(path).await.ok(),
        None => None,
    };

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }
        if let Some(exclude) = &exclude
            && tokio::fs::canonicalize(&path).await.ok().as_ref() == Some(exclude)
        {
            continue;
        }
        files.push(path);
    }
    files.sort();

    let mut merged = Vec::new();
    let mut summary = MergeSummary::default();

    for path in files {
        let parsed = tokio::fs::read_to_string(&path)
            .await
            .map_err(StorageError::from)
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(StorageError::from));

        match parsed {
            Ok(Value::Array(records)) => {
                merged.extend(records);
                summary.files_merged.push(path);
            }
            Ok(_) => {
                log::warn!(
                    "{} does not contain a JSON array and will be skipped",
                    path.display()
                );
                summary.files_skipped.push(path);
            }
            Err(e) => {
                log::error!("Error reading or parsing {}: {e}", path.display());
                summary.files_skipped.push(path);
            }
        }
    }

    summary.total = merged.len();
    Ok((merged, summary))
}

/// Merges `dir` into `output` as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns [`StorageError`] if the directory can't be listed or the output
/// can't be written.
pub async fn merge_into(dir: &Path, output: &Path) -> Result<MergeSummary, StorageError> {
    let (merged, summary) = collect_dir(dir, Some(output)).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::paths::ensure_dir(parent).await?;
    }
    tokio::fs::write(output, serde_json::to_string_pretty(&merged)?).await?;

    log::info!(
        "Successfully merged {} incidents into {}",
        summary.total,
        output.display()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merges_arrays_and_skips_the_rest() {
        let dir = std::env::temp_dir().join("incident_map_storage_merge");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        std::fs::write(dir.join("a.json"), r#"[{"n": 1}, {"n": 2}]"#).unwrap();
        std::fs::write(dir.join("b.JSON"), r#"[{"n": 3}]"#).unwrap();
        std::fs::write(dir.join("c.json"), r#"{"n": 4}"#).unwrap();
        std::fs::write(dir.join("d.json"), "not json").unwrap();
        std::fs::write(dir.join("notes.txt"), "[1, 2, 3]").unwrap();

        let output = dir.join("merged.json");
        let summary = merge_into(&dir, &output).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.files_merged.len(), 2);
        assert_eq!(summary.files_skipped.len(), 2);

        let written: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        let ns: Vec<i64> = written.iter().filter_map(|v| v["n"].as_i64()).collect();
        assert_eq!(ns, vec![1, 2, 3]);

        // Re-running must not fold the previous output back in.
        let again = merge_into(&dir, &output).await.unwrap();
        assert_eq!(again.total, 3);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn output_is_excluded_when_spelled_differently() {
        let dir = std::env::temp_dir().join("incident_map_storage_merge_spelling");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.json"), r#"[{"n": 1}]"#).unwrap();

        let output = dir.join(".").join("merged.json");
        assert_eq!(merge_into(&dir, &output).await.unwrap().total, 1);

        let again = merge_into(&dir, &output).await.unwrap();
        assert_eq!(again.total, 1);
        assert_eq!(again.files_merged, vec![dir.join("a.json")]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_dir_is_an_error() {
        let dir = std::env::temp_dir().join("incident_map_storage_merge_missing");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(collect_dir(&dir, None).await.is_err());
    }
}
