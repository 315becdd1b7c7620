//! JSON Lines generation log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use ragline_core::traits::GenerationLog;
use ragline_core::types::GenerationRecord;

pub struct JsonlGenerationLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlGenerationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), lock: Mutex::new(()) } }

    pub fn path(&self) -> &Path { &self.path }
}

impl GenerationLog for JsonlGenerationLog {
    fn record(&self, entry: &GenerationRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(entry)?;
        let _guard = self.lock.lock().map_err(|_| anyhow::anyhow!("generation log lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
