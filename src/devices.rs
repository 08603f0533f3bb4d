use crate::{Result, SnapshotError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    pub user_agent: String,
    pub touch: bool,
    pub mobile: bool,
    pub landscape: bool,
}

impl DeviceProfile {
    pub fn validate(&self) -> Result<()> {
        if self.width < 320 || self.height < 320 {
            return Err(SnapshotError::ConfigError(
                "Device dimensions must be at least 320x320".into(),
            ));
        }

        if self.pixel_ratio < 0.5 || self.pixel_ratio > 5.0 {
            return Err(SnapshotError::ConfigError(
                "Pixel ratio must be between 0.5 and 5.0".into(),
            ));
        }

        if self.user_agent.is_empty() {
            return Err(SnapshotError::ConfigError("User agent cannot be empty".into()));
        }

        Ok(())
    }
}

pub static DEVICE_PRESETS: Lazy<Vec<DeviceProfile>> = Lazy::new(|| {
    vec![
        DeviceProfile {
            name: String::from("Desktop"),
            width: 1920,
            height: 1080,
            pixel_ratio: 1.0,
            user_agent: String::from(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
            ),
            touch: false,
            mobile: false,
            landscape: true,
        },
        DeviceProfile {
            name: String::from("iPhone 13"),
            width: 390,
            height: 844,
            pixel_ratio: 3.0,
            user_agent: String::from(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
            ),
            touch: true,
            mobile: true,
            landscape: false,
        },
        DeviceProfile {
            name: String::from("iPhone SE"),
            width: 375,
            height: 667,
            pixel_ratio: 2.0,
            user_agent: String::from(
                "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
            ),
            touch: true,
            mobile: true,
            landscape: false,
        },
        DeviceProfile {
            name: String::from("iPad"),
            width: 768,
            height: 1024,
            pixel_ratio: 2.0,
            user_agent: String::from(
                "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
            ),
            touch: true,
            mobile: true,
            landscape: false,
        },
        DeviceProfile {
            name: String::from("Pixel 5"),
            width: 393,
            height: 851,
            pixel_ratio: 2.75,
            user_agent: String::from(
                "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
            ),
            touch: true,
            mobile: true,
            landscape: false,
        },
        DeviceProfile {
            name: String::from("Galaxy S9+"),
            width: 320,
            height: 658,
            pixel_ratio: 4.5,
            user_agent: String::from(
                "Mozilla/5.0 (Linux; Android 8.0.0; SM-G965U) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
            ),
            touch: true,
            mobile: true,
            landscape: false,
        },
    ]
});

pub fn get_device_by_name(name: &str) -> Result<DeviceProfile> {
    DEVICE_PRESETS
        .iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| SnapshotError::DeviceNotFound(name.to_string()))
}

/// Parses a `"WxH"` resolution string, e.g. `"1920x1080"`.
pub fn parse_resolution(resolution: &str) -> Result<(u32, u32)> {
    let (width, height) = resolution
        .split_once(['x', 'X'])
        .ok_or_else(|| SnapshotError::InvalidResolution(resolution.to_string()))?;

    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| SnapshotError::InvalidResolution(resolution.to_string()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| SnapshotError::InvalidResolution(resolution.to_string()))?;

    if width == 0 || height == 0 {
        return Err(SnapshotError::InvalidResolution(resolution.to_string()));
    }

    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for device in DEVICE_PRESETS.iter() {
            assert!(device.validate().is_ok(), "invalid preset: {}", device.name);
        }
    }

    #[test]
    fn test_get_device_case_insensitive() {
        let device = get_device_by_name("iphone 13").unwrap();
        assert_eq!(device.name, "iPhone 13");
        assert!(device.mobile);
    }

    #[test]
    fn test_get_device_unknown() {
        assert!(matches!(
            get_device_by_name("Nokia 3310"),
            Err(SnapshotError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("375X667").unwrap(), (375, 667));
    }

    #[test]
    fn test_parse_resolution_invalid() {
        assert!(parse_resolution("1920").is_err());
        assert!(parse_resolution("x1080").is_err());
        assert!(parse_resolution("1920x").is_err());
        assert!(parse_resolution("0x1080").is_err());
        assert!(parse_resolution("widexhigh").is_err());
    }
}
