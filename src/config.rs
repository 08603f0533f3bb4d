use crate::{Result, SnapshotError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    /// Default proxy server, overridden per-request.
    pub proxy: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Default viewport applied when a request names neither a device nor a
    /// resolution.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
}

fn default_headless() -> bool {
    true
}
fn default_request_timeout() -> u64 {
    crate::timeouts::secs::CDP_REQUEST
}
fn default_viewport_width() -> u32 {
    1280
}
fn default_viewport_height() -> u32 {
    800
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            user_data_dir: None,
            proxy: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
        }
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    default_config_dir().map(|p| p.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join(".config"))
        })
        .map(|p| p.join("websnap"))
        .ok_or_else(|| SnapshotError::ConfigError("Could not determine config directory".into()))
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let global_path = default_config_path()?;
        if global_path.exists() {
            let content = std::fs::read_to_string(&global_path)?;
            config = toml::from_str(&content)?;
        }

        let project_path = PathBuf::from(".websnap.toml");
        if project_path.exists() {
            let content = std::fs::read_to_string(&project_path)?;
            let project_config: Config = toml::from_str(&content)?;
            config = config.merge(project_config);
        }

        config.load_from_env();

        Ok(config)
    }

    fn merge(mut self, other: Config) -> Self {
        if other.browser.chrome_path.is_some() {
            self.browser.chrome_path = other.browser.chrome_path;
        }
        if other.browser.user_data_dir.is_some() {
            self.browser.user_data_dir = other.browser.user_data_dir;
        }
        if other.browser.proxy.is_some() {
            self.browser.proxy = other.browser.proxy;
        }
        self
    }

    fn load_from_env(&mut self) {
        if let Ok(path) = std::env::var("WEBSNAP_CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(headless) = std::env::var("WEBSNAP_HEADLESS") {
            self.browser.headless = headless == "true" || headless == "1";
        }
        if let Ok(proxy) = std::env::var("WEBSNAP_PROXY") {
            self.browser.proxy = Some(proxy);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.browser.request_timeout_secs == 0 {
            return Err(SnapshotError::ConfigError(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.capture.viewport_width == 0 || self.capture.viewport_height == 0 {
            return Err(SnapshotError::ConfigError(
                "default viewport must be non-zero".into(),
            ));
        }

        if let Some(ref path) = self.browser.chrome_path
            && !path.exists()
        {
            return Err(SnapshotError::ConfigError(format!(
                "Chrome path does not exist: {}",
                path.display()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.browser.headless);
        assert!(config.browser.chrome_path.is_none());
        assert_eq!(config.browser.request_timeout_secs, 120);
        assert_eq!(config.capture.viewport_width, 1280);
        assert_eq!(config.capture.viewport_height, 800);
    }

    #[test]
    fn test_config_validate_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_zero_timeout() {
        let mut config = Config::default();
        config.browser.request_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_viewport() {
        let mut config = Config::default();
        config.capture.viewport_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_missing_chrome_path() {
        let mut config = Config::default();
        config.browser.chrome_path = Some(PathBuf::from("/nonexistent/chrome-binary"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_merge() {
        let base = Config::default();
        let mut other = Config::default();
        other.browser.chrome_path = Some(PathBuf::from("/usr/bin/chromium"));
        other.browser.proxy = Some("http://proxy:8080".to_string());

        let merged = base.merge(other);
        assert_eq!(
            merged.browser.chrome_path,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        assert_eq!(merged.browser.proxy, Some("http://proxy:8080".to_string()));
    }

    #[test]
    fn test_config_parses_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[browser]\nheadless = false\nproxy = \"socks5://127.0.0.1:1080\"\n",
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let config: Config = toml::from_str(&content).unwrap();

        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.proxy.as_deref(),
            Some("socks5://127.0.0.1:1080")
        );
        // Unspecified sections fall back to defaults.
        assert_eq!(config.capture.viewport_width, 1280);
        assert_eq!(config.browser.request_timeout_secs, 120);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[browser]"));
        assert!(toml_str.contains("[capture]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.browser.headless, config.browser.headless);
        assert_eq!(parsed.capture.viewport_width, config.capture.viewport_width);
    }
}
