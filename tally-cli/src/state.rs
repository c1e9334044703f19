use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tally_core::MerchantRule;
use tally_finance::ReviewQueueEntry;

/// `$TALLY_HOME` when set, otherwise `~/.tally`.
pub fn tally_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tally"))
}

pub fn ensure_tally_home() -> Result<PathBuf> {
    let dir = tally_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn rules_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("rules.json"))
}

pub fn review_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("review.json"))
}

pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

/// Write through a sibling temp file so a crash never leaves half a snapshot.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

pub fn load_rules() -> Result<Vec<MerchantRule>> {
    read_json_or_default(&rules_path()?)
}

pub fn save_rules(rules: &[MerchantRule]) -> Result<()> {
    write_json(&rules_path()?, &rules)
}

pub fn load_review() -> Result<Vec<ReviewQueueEntry>> {
    read_json_or_default(&review_path()?)
}

pub fn save_review(entries: &[ReviewQueueEntry]) -> Result<()> {
    write_json(&review_path()?, &entries)
}
