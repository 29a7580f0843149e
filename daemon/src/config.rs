use std::path::{Path, PathBuf};
use std::time::Duration;

use ledpanel::plan::{PanelAddress, PanelGeometry, PlanError};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::artnet::DEFAULT_PORT;
use crate::error::DaemonError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ledpanel/config.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub rows: usize,
    pub columns: usize,
    pub start_universe: u16,
    /// 1-based DMX address of the panel's first slot.
    pub start_address: usize,
    pub max_brightness: u8,
    pub artnet_bind: String,
    /// 0 keeps the backlight on for good.
    pub backlight_timeout_secs: u64,
    pub debounce_ms: u64,
    pub home_text: String,
    pub status_led_path: Option<PathBuf>,
    pub backlight_path: Option<PathBuf>,
    pub repeat_test_pattern: bool,
    pub buttons: ButtonConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rows: 17,
            columns: 17,
            start_universe: 0,
            start_address: 1,
            max_brightness: 255,
            artnet_bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            backlight_timeout_secs: 30,
            debounce_ms: 200,
            home_text: "Art-Net LED panel".into(),
            status_led_path: None,
            backlight_path: None,
            repeat_test_pattern: true,
            buttons: ButtonConfig::default(),
        }
    }
}

impl Config {
    pub fn geometry(&self) -> PanelGeometry {
        PanelGeometry::new(self.rows, self.columns)
    }

    pub fn address(&self) -> Result<PanelAddress, PlanError> {
        PanelAddress::from_dmx_address(self.start_universe, self.start_address)
    }

    pub fn backlight_timeout(&self) -> Option<Duration> {
        match self.backlight_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ButtonSource {
    /// A Linux input device, e.g. one exposed by the gpio-keys driver.
    Evdev,
    /// Lines typed on standard input.
    Stdin,
    #[default]
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ButtonConfig {
    pub source: ButtonSource,
    pub device: PathBuf,
    pub up: u16,
    pub down: u16,
    pub ok: u16,
    pub back: u16,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        // KEY_UP, KEY_DOWN, KEY_ENTER, KEY_ESC
        Self {
            source: ButtonSource::None,
            device: "/dev/input/event0".into(),
            up: 103,
            down: 108,
            ok: 28,
            back: 1,
        }
    }
}

pub async fn parse_config<P>(path: P) -> Result<Config, DaemonError>
where
    P: AsRef<Path>,
{
    if let Ok(config_file) = tokio::fs::read_to_string(&path).await {
        Ok(toml::from_str(&config_file).map_err(DaemonError::ConfigFileParsingError)?)
    } else {
        warn!(
            "unable to read config file {}, using default config",
            path.as_ref().display()
        );
        Ok(Config::default())
    }
}
