use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Print `value` to stdout and, when `out` is set, also persist it with a `built_at` stamp.
pub fn emit(value: Value, out: Option<&Path>) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&value).context("failed serialising output")?;
    println!("{rendered}");
    if let Some(path) = out {
        write_json_atomic(path, &stamped(value))?;
        tracing::info!(path = %path.display(), "wrote output");
    }
    Ok(())
}

fn stamped(mut value: Value) -> Value {
    let now = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string());
    if !value.is_object() {
        value = json!({ "result": value });
    }
    value["built_at"] = json!(now);
    value
}

pub fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised = serde_json::to_string_pretty(value).context("failed serialising JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_stamped_json_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tx.json");

        emit(json!({ "hash": "0x01" }), Some(&path)).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["hash"], "0x01");
        let built_at = written["built_at"].as_str().unwrap();
        assert!(OffsetDateTime::parse(built_at, &Rfc3339).is_ok());
        assert!(!tmp_path_for(&path).exists());
    }

    #[test]
    fn non_object_values_are_wrapped() {
        let value = stamped(json!("0xdeadbeef"));
        assert_eq!(value["result"], "0xdeadbeef");
        assert!(value.get("built_at").is_some());
    }
}
