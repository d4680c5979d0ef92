// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Concrete [`LongTermStore`] backed by a single JSON file: an object mapping
//! entry id to entry, written atomically on every `persist` call.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use stepwise_core::{LongTermStore, MemoryEntry};

/// Persists every entry handed to it into one JSON file, keyed by entry id.
///
/// The whole map is rewritten on each call: read the current file (if any),
/// insert the new entry, write to a sibling `.tmp` path, then rename over the
/// original. The rename is atomic on the same filesystem, so a crash mid-write
/// never leaves a truncated or partially-written file in place.
pub struct JsonFileLongTermStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileLongTermStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> anyhow::Result<BTreeMap<String, MemoryEntry>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)
                .with_context(|| format!("parsing long-term memory file {}", self.path.display()))?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("reading long-term memory file {}", self.path.display())),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, MemoryEntry>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating long-term memory directory {}", parent.display()))?;
            }
        }
        let body = serde_json::to_string_pretty(entries).context("serializing long-term memory")?;
        let tmp_path = tmp_path_for(&self.path);
        fs::write(&tmp_path, body)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming {} to {}", tmp_path.display(), self.path.display()))?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "long_term_memory.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

impl LongTermStore for JsonFileLongTermStore {
    fn persist(&self, entry: &MemoryEntry) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self.read_all()?;
        entries.insert(entry.id().to_string(), entry.clone());
        self.write_all(&entries)
    }
}
