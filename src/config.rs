use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{NoteError, NoteResult};

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub convert: ConvertConfig,
    pub export: ExportConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConvertConfig {
    /// `0` sizes the pool to the available parallelism.
    pub max_workers: usize,
    /// `0` disables the per-chunk timeout.
    pub chunk_timeout_ms: u64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            chunk_timeout_ms: 120_000,
        }
    }
}

impl ConvertConfig {
    pub fn chunk_timeout(&self) -> Option<Duration> {
        (self.chunk_timeout_ms > 0).then(|| Duration::from_millis(self.chunk_timeout_ms))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportConfig {
    /// Embed data URLs in markdown instead of linking written PNG files.
    pub inline_images: bool,
    pub include_text: bool,
    pub image_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            inline_images: false,
            include_text: true,
            image_dir: "images".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Warn)
    }
}

impl Config {
    pub fn load() -> NoteResult<Self> {
        let Some(path) = default_config_path() else {
            return Ok(Self::default());
        };
        Self::load_from_path(path)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> NoteResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        if !path.is_file() {
            return Err(NoteError::invalid_argument(format!(
                "config path is not a regular file: {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path).map_err(|source| {
            NoteError::io_with_context(source, format!("failed to read config: {}", path.display()))
        })?;
        let parsed = toml::from_str::<Self>(&raw).map_err(|source| {
            NoteError::invalid_argument(format!(
                "failed to parse config {}: {source}",
                path.display()
            ))
        })?;
        Ok(parsed.sanitized())
    }

    fn sanitized(mut self) -> Self {
        if self.export.image_dir.trim().is_empty() {
            self.export.image_dir = ExportConfig::default().image_dir;
        }
        if self.log.level.parse::<log::LevelFilter>().is_err() {
            self.log.level = LogConfig::default().level;
        }
        self
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os("SNR_CONFIG_PATH")
        && !explicit.is_empty()
    {
        return Some(PathBuf::from(explicit));
    }

    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        return Some(PathBuf::from(xdg).join("snr").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME")
        && !home.is_empty()
    {
        return Some(
            PathBuf::from(home)
                .join(".config")
                .join("snr")
                .join("config.toml"),
        );
    }
    if let Some(appdata) = std::env::var_os("APPDATA")
        && !appdata.is_empty()
    {
        return Some(PathBuf::from(appdata).join("snr").join("config.toml"));
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::Config;

    #[test]
    fn load_from_path_returns_defaults_for_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config::load_from_path(dir.path().join("missing.toml"))
            .expect("missing config should fallback");
        assert_eq!(config, Config::default());
        assert_eq!(
            config.convert.chunk_timeout(),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn load_from_path_applies_partial_overrides_and_sanitizes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            r#"
            [convert]
            max_workers = 3
            chunk_timeout_ms = 0

            [export]
            image_dir = "  "
            inline_images = true

            [log]
            level = "chatty"
            "#,
        )
        .expect("config file should be written");

        let config = Config::load_from_path(&path).expect("config should parse");
        assert_eq!(config.convert.max_workers, 3);
        assert_eq!(config.convert.chunk_timeout(), None);
        assert!(config.export.inline_images);
        assert!(config.export.include_text);
        assert_eq!(config.export.image_dir, "images");
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.level_filter(), log::LevelFilter::Warn);
    }

    #[test]
    fn load_from_path_rejects_directories_and_bad_toml() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(Config::load_from_path(dir.path()).is_err());

        let path = dir.path().join("broken.toml");
        fs::write(&path, "[convert\nmax_workers = ").expect("config file should be written");
        assert!(Config::load_from_path(&path).is_err());
    }
}
