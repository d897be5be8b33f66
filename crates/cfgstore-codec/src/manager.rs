//! Configuration file persistence
//!
//! Saves go to a temp file in the destination directory which is then
//! renamed over the destination, so a failed save leaves the previous file
//! untouched. Backups are copied from the new file after the rename and
//! never fail a save.

use crate::codec::{effective_mode, ReadContext};
use crate::options::StoreOptions;
use crate::registry::CodecRegistry;
use cfgstore_core::{full_diff, StoredConfiguration};
use cfgstore_model::{ConfigKey, EncodingMode, StoreError, StoreResult};
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Loads and saves one configuration file
#[derive(Debug)]
pub struct ConfigFileManager {
    path: PathBuf,
    options: StoreOptions,
    codecs: CodecRegistry,
    context: ReadContext,
    saving: AtomicBool,
    /// Last snapshot read from or written to `path`
    persisted: Mutex<Option<Arc<StoredConfiguration>>>,
}

/// Clears the saving flag however the save ends
struct SavingGuard<'a>(&'a AtomicBool);

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ConfigFileManager {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, context: ReadContext, options: StoreOptions) -> Self {
        Self {
            path: path.into(),
            options,
            codecs: CodecRegistry::with_defaults(),
            context,
            saving: AtomicBool::new(false),
            persisted: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> &ReadContext {
        &self.context
    }

    /// Whether a save is running; for status display only
    #[inline]
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Read, migrate and validate the file
    ///
    /// # Errors
    /// Returns Io if the file cannot be read, otherwise whatever the codec
    /// for the detected format returns
    pub fn load(&self) -> StoreResult<StoredConfiguration> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let (format, config) = self.codecs.read(&bytes, &self.context)?;
        tracing::info!(
            path = %self.path.display(),
            %format,
            values = config.len(),
            "configuration loaded"
        );
        *self.persisted.lock() = Some(Arc::new(config.clone()));
        Ok(config)
    }

    /// Write `config` in the configured format and return the keys that
    /// differ from the previously persisted snapshot
    ///
    /// Every key counts as changed when nothing was persisted through this
    /// manager before.
    ///
    /// # Errors
    /// Returns error if encoding, writing or renaming fails, or if the
    /// verification read does not reproduce `config`. The previous file is
    /// untouched in the first three cases.
    pub fn save(&self, config: &StoredConfiguration) -> StoreResult<Vec<ConfigKey>> {
        let _span = tracing::info_span!("save", path = %self.path.display()).entered();
        self.saving.store(true, Ordering::Release);
        let _guard = SavingGuard(&self.saving);

        let previous = self.persisted.lock().clone();
        let changed = match &previous {
            Some(previous) => full_diff(previous, config),
            None => config.keys(),
        };
        for key in &changed {
            let actor = config
                .read_metadata(key)
                .and_then(|m| m.user_identity.as_ref())
                .map(ToString::to_string);
            tracing::info!(%key, actor = actor.as_deref().unwrap_or("-"), "configuration change");
        }

        let format = self.options.format;
        let mode = effective_mode(config, self.options.encoding);
        let bytes = self.codecs.codec(format)?.write(config, mode)?;
        self.write_atomic(&bytes)?;
        tracing::info!(%format, bytes = bytes.len(), changes = changed.len(), "configuration saved");

        self.rotate_backups();

        // stripped output drops confidential values and cannot match
        if self.options.verify_after_save && mode != EncodingMode::Stripped {
            self.verify(config)?;
        }
        *self.persisted.lock() = Some(Arc::new(config.clone()));
        Ok(changed)
    }

    fn write_atomic(&self, bytes: &[u8]) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        temp.write_all(bytes).map_err(|e| StoreError::io(temp.path(), e))?;
        temp.as_file().sync_all().map_err(|e| StoreError::io(temp.path(), e))?;
        temp.persist(&self.path).map_err(|e| {
            tracing::warn!(error = %e.error, "rename over configuration file failed");
            StoreError::io(&self.path, e.error)
        })?;
        Ok(())
    }

    fn backup_path(&self, dir: &Path, n: usize) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| "configuration".into(), |n| n.to_string_lossy().into_owned());
        dir.join(format!("{name}.{n}.bak"))
    }

    /// Shift `<name>.<n>.bak` up by one and copy the new file to slot 1
    fn rotate_backups(&self) {
        let count = self.options.backup_count;
        if count == 0 {
            return;
        }
        let dir = match (&self.options.backup_dir, self.path.parent()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            (None, _) => PathBuf::from("."),
        };
        if let Err(error) = fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), %error, "backup directory unavailable");
            return;
        }
        let oldest = self.backup_path(&dir, count);
        if oldest.exists() {
            if let Err(error) = fs::remove_file(&oldest) {
                tracing::warn!(path = %oldest.display(), %error, "could not drop oldest backup");
            }
        }
        for n in (1..count).rev() {
            let from = self.backup_path(&dir, n);
            if !from.exists() {
                continue;
            }
            let to = self.backup_path(&dir, n + 1);
            if let Err(error) = fs::rename(&from, &to) {
                tracing::warn!(from = %from.display(), to = %to.display(), %error, "backup rotation failed");
            }
        }
        let first = self.backup_path(&dir, 1);
        match fs::copy(&self.path, &first) {
            Ok(_) => tracing::debug!(path = %first.display(), "backup written"),
            Err(error) => tracing::warn!(path = %first.display(), %error, "backup failed"),
        }
    }

    fn verify(&self, expected: &StoredConfiguration) -> StoreResult<()> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        let (_, reread) = self.codecs.read(&bytes, &self.context)?;
        let drift = full_diff(expected, &reread);
        if drift.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = drift.iter().map(ToString::to_string).collect();
        tracing::warn!(keys = ?keys, "saved file does not reproduce the configuration");
        Err(StoreError::format(format!(
            "verification after save found {} differing keys: {}",
            keys.len(),
            keys.join(", ")
        )))
    }
}
