use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{anyhow, Context, Result};
use tracing::warn;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub map: MapConfig,
    pub categories: Vec<CategoryConfig>,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub data_csv: PathBuf,
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            data_csv: PathBuf::from("data/baches.csv"),
            delimiter: ';',
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub center: [f64; 2], // [lat, lng]
    pub zoom: u8,
    pub height_px: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [-33.5101, -70.7577],
            zoom: 14,
            height_px: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CategoryConfig {
    pub name: String,
    pub color: String, // Hex code
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub html_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { html_file: PathBuf::from("baches.html") }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8501 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    /// Falls back to the built-in defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// The CSV reader only takes single-byte delimiters.
    pub fn delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.input.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| anyhow!("Delimiter must be an ASCII character, got {:?}", self.input.delimiter))
    }

    fn validate(&self) -> Result<()> {
        self.delimiter_byte()?;
        if self.map.zoom > 22 {
            return Err(anyhow!("Map zoom {} is out of range (0-22)", self.map.zoom));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.input.data_csv, PathBuf::from("data/baches.csv"));
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(config.map.center, [-33.5101, -70.7577]);
        assert_eq!(config.map.zoom, 14);
        assert!(config.categories.is_empty());
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_partial_sections_fill_in_defaults() {
        let config = AppConfig::from_toml(
            r##"
            [input]
            data_csv = "other.csv"

            [[categories]]
            name = "Hoyo"
            color = "#000000"
            "##,
        )
        .unwrap();
        assert_eq!(config.input.data_csv, PathBuf::from("other.csv"));
        assert_eq!(config.input.delimiter, ';');
        assert_eq!(
            config.categories,
            vec![CategoryConfig { name: "Hoyo".into(), color: "#000000".into() }]
        );
    }

    #[test]
    fn test_rejects_multibyte_delimiter() {
        let err = AppConfig::from_toml("[input]\ndelimiter = \"ñ\"").unwrap_err();
        assert!(err.to_string().contains("Delimiter"));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 9000\n").unwrap();
        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.server.port, 9000);
    }
}
