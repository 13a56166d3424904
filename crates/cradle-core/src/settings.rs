//! Persisted shell settings: which directory to serve and which file is the
//! entry point, plus the external-editor preference.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "setting.json";
const DEFAULT_ENTRY_FILE: &str = "index.html";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the HTML app; empty means "no local content
    /// configured" and the shell falls back to the inline welcome page.
    #[serde(rename = "dirPath", default)]
    pub dir_path: String,
    /// Entry file name inside `dir_path`.
    #[serde(rename = "fileName", default)]
    pub file_name: String,
    #[serde(rename = "openTextEditor", default)]
    pub open_text_editor: bool,
    #[serde(rename = "TextEditor_Path", default)]
    pub text_editor_path: String,
}

/// Reads and writes `setting.json` under the config root. Loading always
/// normalizes: a persisted directory that no longer exists resets to empty
/// rather than erroring, and an empty editor path disables the editor.
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    pub fn load(config_root: &Path) -> Result<Self> {
        let path = config_root.join(SETTINGS_FILE);
        if !path.exists() {
            let store = Self {
                path,
                settings: Settings::default(),
            };
            store.save()?;
            return Ok(store);
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse settings file: {}", path.display()))?;
        normalize(&mut settings);
        Ok(Self { path, settings })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config root: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write settings file: {}", self.path.display()))
    }

    /// Splits a chosen entry file into directory + file name and persists
    /// both.
    pub fn set_entry_path(&mut self, full_path: &Path) -> Result<()> {
        let dir = full_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| anyhow!("entry file has no parent directory: {}", full_path.display()))?;
        let file = full_path
            .file_name()
            .ok_or_else(|| anyhow!("entry path has no file name: {}", full_path.display()))?;

        self.settings.dir_path = dir.to_string_lossy().into_owned();
        self.settings.file_name = file.to_string_lossy().into_owned();
        self.save()
    }

    /// `None` when no local content is configured.
    pub fn root_dir(&self) -> Option<PathBuf> {
        if self.settings.dir_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.settings.dir_path))
        }
    }

    pub fn entry_file_name(&self) -> &str {
        if self.settings.file_name.is_empty() {
            DEFAULT_ENTRY_FILE
        } else {
            &self.settings.file_name
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

fn normalize(settings: &mut Settings) {
    if !settings.dir_path.is_empty() && !Path::new(&settings.dir_path).is_dir() {
        tracing::info!(
            dir = %settings.dir_path,
            "configured content directory no longer exists, resetting"
        );
        settings.dir_path.clear();
    }
    if settings.text_editor_path.is_empty() {
        settings.open_text_editor = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path()).unwrap();

        assert!(store.root_dir().is_none());
        assert_eq!(store.entry_file_name(), "index.html");
        assert!(dir.path().join("setting.json").exists());
    }

    #[test]
    fn set_entry_path_splits_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(&app).unwrap();

        let mut store = SettingsStore::load(dir.path()).unwrap();
        store.set_entry_path(&app.join("main.html")).unwrap();

        let reloaded = SettingsStore::load(dir.path()).unwrap();
        assert_eq!(reloaded.root_dir().unwrap(), app);
        assert_eq!(reloaded.entry_file_name(), "main.html");
    }

    #[test]
    fn stale_directory_resets_to_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        fs::create_dir_all(&app).unwrap();

        let mut store = SettingsStore::load(dir.path()).unwrap();
        store.set_entry_path(&app.join("index.html")).unwrap();
        fs::remove_dir_all(&app).unwrap();

        let reloaded = SettingsStore::load(dir.path()).unwrap();
        assert!(reloaded.root_dir().is_none());
    }

    #[test]
    fn empty_editor_path_disables_editor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("setting.json"),
            r#"{"dirPath":"","fileName":"","openTextEditor":true,"TextEditor_Path":""}"#,
        )
        .unwrap();

        let store = SettingsStore::load(dir.path()).unwrap();
        assert!(!store.settings().open_text_editor);
    }

    #[test]
    fn persisted_document_keeps_legacy_key_names() {
        let dir = tempfile::tempdir().unwrap();
        SettingsStore::load(dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("setting.json")).unwrap();
        for key in ["dirPath", "fileName", "openTextEditor", "TextEditor_Path"] {
            assert!(content.contains(key), "missing key {key} in {content}");
        }
    }

    #[test]
    fn entry_path_without_parent_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(dir.path()).unwrap();
        let err = store.set_entry_path(Path::new("index.html")).unwrap_err();
        assert!(err.to_string().contains("no parent directory"));
    }
}
