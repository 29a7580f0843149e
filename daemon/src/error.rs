use ledpanel::plan::PlanError;
use ledpanel::screen::ScreenError;
use thiserror::Error;

use crate::panel::PanelError;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Config file parsing error: {0}")]
    ConfigFileParsingError(#[from] toml::de::Error),
    #[error("Invalid panel configuration: {0}")]
    InvalidPanel(#[from] PlanError),
    #[error("Panel error: {0}")]
    Panel(#[from] PanelError),
    #[error("Failed to build menu: {0}")]
    Menu(#[from] ScreenError),
    #[error("Failed to bind Art-Net socket {0}: {1}")]
    BindError(String, std::io::Error),
    #[error("Failed to open button device {0}: {1}")]
    ButtonDeviceError(String, std::io::Error),
    #[error("Failed to start thread: {0}")]
    ThreadError(std::io::Error),
}
