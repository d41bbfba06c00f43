use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::language::LanguageMode;
use crate::utils::app_config_dir;

/// The filename under the app config dir
pub const SETTINGS_FILENAME: &str = "settings.toml";

pub const DEFAULT_HOVER_DELAY_MS: u64 = 500;
pub const DEFAULT_API_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection block for the translation backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub api_base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendSettings {
    /// Returns the effective API base URL, falling back to the default when blank.
    pub fn effective_base_url(&self) -> String {
        if self.api_base_url.trim().is_empty() {
            DEFAULT_API_BASE_URL.to_string()
        } else {
            self.api_base_url.trim().to_string()
        }
    }

    pub fn effective_model(&self) -> String {
        if self.model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            self.model.trim().to_string()
        }
    }
}

/// User configurable engine settings persisted in settings.toml.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub enabled: bool,
    pub hover_delay_ms: u64,
    pub language_mode: LanguageMode,
    pub show_pronunciation: bool,
    pub show_examples: bool,
    pub debug_mode: bool,
    pub backend: BackendSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            hover_delay_ms: DEFAULT_HOVER_DELAY_MS,
            language_mode: LanguageMode::Ja,
            show_pronunciation: true,
            show_examples: true,
            debug_mode: false,
            backend: BackendSettings::default(),
        }
    }
}

pub type SettingsListener = Arc<dyn Fn(&Settings) + Send + Sync>;

/// Key-value style settings store backed by a TOML file.
///
/// `set` persists the full value and notifies every registered listener with
/// the new settings; consumers replace their cached copy wholesale.
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
    listeners: Vec<SettingsListener>,
}

impl SettingsStore {
    /// Open the store at the OS-standard config path, writing defaults on
    /// first run.
    pub fn open() -> Result<Self> {
        Self::at_path(app_config_dir().join(SETTINGS_FILENAME))
    }

    /// Open the store at an explicit path (used by tests and the demo).
    pub fn at_path(path: PathBuf) -> Result<Self> {
        let current = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("read settings: {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parse settings: {}", path.display()))?
        } else {
            let defaults = Settings::default();
            write_settings(&path, &defaults)?;
            defaults
        };
        Ok(Self {
            path,
            current,
            listeners: Vec::new(),
        })
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    /// Persist the full settings value and notify listeners.
    pub fn set(&mut self, settings: Settings) -> Result<()> {
        write_settings(&self.path, &settings)?;
        self.current = settings;
        for listener in &self.listeners {
            listener(&self.current);
        }
        Ok(())
    }

    /// Mutate-and-persist convenience for the options UI.
    pub fn update<F: FnOnce(&mut Settings)>(&mut self, f: F) -> Result<()> {
        let mut next = self.current.clone();
        f(&mut next);
        self.set(next)
    }

    pub fn subscribe(&mut self, listener: SettingsListener) {
        self.listeners.push(listener);
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    let raw = toml::to_string(settings).context("serialize settings")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create settings dir: {}", parent.display()))?;
    }
    // Atomic-ish write: write to temp file then rename
    let tmp_path = path.with_extension("toml.tmp");
    {
        let mut f = std::fs::File::create(&tmp_path)
            .with_context(|| format!("create temp settings: {}", tmp_path.display()))?;
        f.write_all(raw.as_bytes())?;
        f.flush()?;
    }
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("replace settings: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn temp_settings_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "hoverlens-settings-{}-{}.toml",
            tag,
            std::process::id()
        ))
    }

    #[test]
    fn first_open_writes_defaults() {
        let path = temp_settings_path("defaults");
        let _ = std::fs::remove_file(&path);
        let store = SettingsStore::at_path(path.clone()).unwrap();
        assert_eq!(*store.get(), Settings::default());
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn set_persists_and_reloads() {
        let path = temp_settings_path("persist");
        let _ = std::fs::remove_file(&path);
        let mut store = SettingsStore::at_path(path.clone()).unwrap();
        store
            .update(|s| {
                s.hover_delay_ms = 750;
                s.language_mode = LanguageMode::All;
            })
            .unwrap();

        let reopened = SettingsStore::at_path(path.clone()).unwrap();
        assert_eq!(reopened.get().hover_delay_ms, 750);
        assert_eq!(reopened.get().language_mode, LanguageMode::All);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn listeners_converge_within_one_notification() {
        let path = temp_settings_path("listen");
        let _ = std::fs::remove_file(&path);
        let mut store = SettingsStore::at_path(path.clone()).unwrap();

        let cache: Arc<Mutex<Settings>> = Arc::new(Mutex::new(Settings::default()));
        let cache_in = cache.clone();
        store.subscribe(Arc::new(move |s| {
            *cache_in.lock().unwrap() = s.clone();
        }));

        store.update(|s| s.enabled = false).unwrap();
        assert_eq!(*cache.lock().unwrap(), *store.get());
        let _ = std::fs::remove_file(&path);
    }
}
