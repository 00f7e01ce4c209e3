use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub const VISION_ENDPOINT: &str = "vision-endpoint";
pub const VISION_KEY: &str = "vision-key";
pub const VISION_MODEL_VERSION: &str = "vision-model-version";
pub const TRANSLATE_ENDPOINT: &str = "translate-endpoint";
pub const TRANSLATE_KEY: &str = "translate-key";
pub const TRANSLATE_REGION: &str = "translate-region";
pub const TRANSLATION_PROVIDER: &str = "translation-provider";
pub const GOOGLE_TRANSLATE_KEY: &str = "google-translate-key";
pub const AUTO_TRANSLATE: &str = "auto-translate";
pub const IGNORE_NEWLINES: &str = "ignore-newlines";
pub const UI_THEME: &str = "ui-theme";
pub const LAST_RESULT: &str = "last-result";

pub const DEFAULT_TRANSLATE_ENDPOINT: &str =
    "https://api.cognitive.microsofttranslator.com/translate?api-version=3.0&to=en";
pub const DEFAULT_MODEL_VERSION: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranslationProviderKind {
    #[default]
    Azure,
    Google,
}

impl TranslationProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationProviderKind::Azure => "azure",
            TranslationProviderKind::Google => "google",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TranslationProviderKind::Azure => "Azure",
            TranslationProviderKind::Google => "Google",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "azure" => Some(TranslationProviderKind::Azure),
            "google" => Some(TranslationProviderKind::Google),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeChoice {
    #[default]
    System,
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl ThemeChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeChoice::System => "system",
            ThemeChoice::Light => "light",
            ThemeChoice::Dark => "dark",
        }
    }

    /// `system` follows the host colour-scheme preference.
    pub fn resolve(&self, prefers_dark: bool) -> Theme {
        match self {
            ThemeChoice::Light => Theme::Light,
            ThemeChoice::Dark => Theme::Dark,
            ThemeChoice::System if prefers_dark => Theme::Dark,
            ThemeChoice::System => Theme::Light,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "system" => Some(ThemeChoice::System),
            "light" => Some(ThemeChoice::Light),
            "dark" => Some(ThemeChoice::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub vision_endpoint: String,
    pub vision_key: String,
    pub vision_model_version: String,
    pub translate_endpoint: String,
    pub translate_key: String,
    pub translate_region: String,
    pub translation_provider: TranslationProviderKind,
    pub google_translate_key: String,
    pub auto_translate: bool,
    pub ignore_newlines: bool,
    pub ui_theme: ThemeChoice,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vision_endpoint: String::new(),
            vision_key: String::new(),
            vision_model_version: DEFAULT_MODEL_VERSION.to_string(),
            translate_endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            translate_key: String::new(),
            translate_region: String::new(),
            translation_provider: TranslationProviderKind::Azure,
            google_translate_key: String::new(),
            auto_translate: true,
            ignore_newlines: true,
            ui_theme: ThemeChoice::System,
        }
    }
}

/// Outcome of the most recent successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastResult {
    pub ocr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl LastResult {
    pub fn now(ocr: impl Into<String>, translated: Option<String>) -> Self {
        let now = time::OffsetDateTime::now_utc();
        Self {
            ocr: ocr.into(),
            translated,
            timestamp: (now.unix_timestamp_nanos() / 1_000_000) as i64,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SettingsFile {
    vision_endpoint: Option<String>,
    vision_key: Option<String>,
    vision_model_version: Option<String>,
    translate_endpoint: Option<String>,
    translate_key: Option<String>,
    translate_region: Option<String>,
    translation_provider: Option<String>,
    google_translate_key: Option<String>,
    auto_translate: Option<bool>,
    ignore_newlines: Option<bool>,
    ui_theme: Option<String>,
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        merge_string(&mut self.vision_endpoint, incoming.vision_endpoint);
        merge_string(&mut self.vision_key, incoming.vision_key);
        merge_string(&mut self.vision_model_version, incoming.vision_model_version);
        merge_string(&mut self.translate_endpoint, incoming.translate_endpoint);
        merge_string(&mut self.translate_key, incoming.translate_key);
        merge_string(&mut self.translate_region, incoming.translate_region);
        merge_string(&mut self.google_translate_key, incoming.google_translate_key);
        if let Some(provider) = incoming
            .translation_provider
            .as_deref()
            .and_then(TranslationProviderKind::parse)
        {
            self.translation_provider = provider;
        }
        if let Some(theme) = incoming.ui_theme.as_deref().and_then(ThemeChoice::parse) {
            self.ui_theme = theme;
        }
        if let Some(auto) = incoming.auto_translate {
            self.auto_translate = auto;
        }
        if let Some(ignore) = incoming.ignore_newlines {
            self.ignore_newlines = ignore;
        }
    }

    pub fn vision_configured(&self) -> bool {
        !self.vision_endpoint.trim().is_empty() && !self.vision_key.trim().is_empty()
    }

    /// Key/value pairs for display. Credentials are masked.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (VISION_ENDPOINT, self.vision_endpoint.clone()),
            (VISION_KEY, mask_secret(&self.vision_key)),
            (VISION_MODEL_VERSION, self.vision_model_version.clone()),
            (TRANSLATE_ENDPOINT, self.translate_endpoint.clone()),
            (TRANSLATE_KEY, mask_secret(&self.translate_key)),
            (TRANSLATE_REGION, self.translate_region.clone()),
            (TRANSLATION_PROVIDER, self.translation_provider.as_str().to_string()),
            (GOOGLE_TRANSLATE_KEY, mask_secret(&self.google_translate_key)),
            (AUTO_TRANSLATE, self.auto_translate.to_string()),
            (IGNORE_NEWLINES, self.ignore_newlines.to_string()),
            (UI_THEME, self.ui_theme.as_str().to_string()),
        ]
    }
}

fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count == 0 {
        return String::new();
    }
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}

fn merge_string(target: &mut String, incoming: Option<String>) {
    if let Some(value) = incoming {
        let value = value.trim();
        if !value.is_empty() {
            *target = value.to_string();
        }
    }
}

/// Flat key/value settings bag. Writes merge into the existing keys.
pub trait SettingsStore: Send + Sync {
    fn read(&self) -> Result<toml::Table>;
    fn write(&self, values: toml::Table) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<toml::Table>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: toml::Table) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read(&self) -> Result<toml::Table> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?;
        Ok(values.clone())
    }

    fn write(&self, incoming: toml::Table) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?;
        values.extend(incoming);
        Ok(())
    }
}

/// TOML file backed store. Missing files read as empty.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$HOME/.snip-ocr/settings.toml`
    pub fn open_default() -> Result<Self> {
        let home = std::env::var("HOME").ok();
        let dir = settings_dir(home.as_deref())
            .ok_or_else(|| anyhow!("HOME is not set; pass --settings explicitly"))?;
        Ok(Self::new(dir.join("settings.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    fn read(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read settings: {}", self.path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse settings: {}", self.path.display()))
    }

    fn write(&self, incoming: toml::Table) -> Result<()> {
        let mut values = self.read()?;
        values.extend(incoming);
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create settings directory: {}", parent.display()))?;
        let content = toml::to_string(&values).with_context(|| "failed to serialize settings")?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .with_context(|| "failed to create temporary settings file")?;
        tmp.write_all(content.as_bytes())
            .with_context(|| "failed to write temporary settings file")?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write settings: {}", self.path.display()))?;
        Ok(())
    }
}

fn settings_dir(home: Option<&str>) -> Option<PathBuf> {
    let home = home?.trim();
    if home.is_empty() {
        None
    } else {
        Some(Path::new(home).join(".snip-ocr"))
    }
}

pub fn defaults_table() -> Result<toml::Table> {
    toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse bundled default settings")
}

/// Write defaults for every missing key; existing values are preserved.
/// Returns the keys that were filled in.
pub fn ensure_defaults(store: &dyn SettingsStore) -> Result<Vec<String>> {
    let existing = store.read()?;
    let mut missing = toml::Table::new();
    for (key, value) in defaults_table()? {
        if !existing.contains_key(&key) {
            missing.insert(key, value);
        }
    }
    let keys = missing.keys().cloned().collect::<Vec<_>>();
    if !missing.is_empty() {
        info!(keys = ?keys, "writing default settings");
        store.write(missing)?;
    }
    Ok(keys)
}

/// Read the typed configuration, filling any gap from the defaults.
pub fn load(store: &dyn SettingsStore) -> Result<Settings> {
    let mut values = store.read()?;
    values.remove(LAST_RESULT);
    let defaults = defaults_table()?;
    let mistyped: Vec<String> = values
        .iter()
        .filter_map(|(key, value)| {
            let default = defaults.get(key)?;
            (default.type_str() != value.type_str()).then(|| {
                warn!(
                    key = key.as_str(),
                    expected = default.type_str(),
                    found = value.type_str(),
                    "ignoring stored setting of the wrong type"
                );
                key.clone()
            })
        })
        .collect();
    for key in mistyped {
        values.remove(&key);
    }
    let parsed: SettingsFile = toml::Value::Table(values)
        .try_into()
        .with_context(|| "failed to interpret stored settings")?;
    let mut settings = Settings::default();
    settings.merge(parsed);
    Ok(settings)
}

/// Set one option from its textual form, as the options form does.
pub fn update(store: &dyn SettingsStore, key: &str, raw: &str) -> Result<()> {
    let defaults = defaults_table()?;
    let Some(default) = defaults.get(key) else {
        return Err(anyhow!("unknown setting '{}'", key));
    };
    let raw = raw.trim();
    let value = match default {
        toml::Value::Boolean(_) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => toml::Value::Boolean(true),
            "false" | "0" | "no" | "off" => toml::Value::Boolean(false),
            _ => return Err(anyhow!("'{}' expects true or false, got '{}'", key, raw)),
        },
        _ => {
            if key == TRANSLATION_PROVIDER && TranslationProviderKind::parse(raw).is_none() {
                return Err(anyhow!("'{}' must be azure or google", key));
            }
            if key == UI_THEME && ThemeChoice::parse(raw).is_none() {
                return Err(anyhow!("'{}' must be system, light or dark", key));
            }
            toml::Value::String(raw.to_string())
        }
    };
    debug!(key, "updating setting");
    let mut table = toml::Table::new();
    table.insert(key.to_string(), value);
    store.write(table)
}

pub fn save_last_result(store: &dyn SettingsStore, result: &LastResult) -> Result<()> {
    let value = toml::Value::try_from(result).with_context(|| "failed to encode last result")?;
    let mut table = toml::Table::new();
    table.insert(LAST_RESULT.to_string(), value);
    store.write(table)
}

pub fn last_result(store: &dyn SettingsStore) -> Result<Option<LastResult>> {
    let mut values = store.read()?;
    let Some(value) = values.remove(LAST_RESULT) else {
        return Ok(None);
    };
    let result = value
        .try_into()
        .with_context(|| "failed to decode last result")?;
    Ok(Some(result))
}
