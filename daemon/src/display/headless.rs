//! Display for boards without a character LCD: lines go to the log, and the
//! backlight, if there is one, is a sysfs value file.

use std::io;
use std::path::PathBuf;

use ledpanel::screen::{DisplayLines, MORE_MARKER};
use log::{error, info};

use super::CharacterDisplay;

#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    backlight_path: Option<PathBuf>,
    shown: DisplayLines,
}

impl HeadlessDisplay {
    pub fn new(backlight_path: Option<PathBuf>) -> Self {
        Self {
            backlight_path,
            shown: DisplayLines::default(),
        }
    }

    pub fn shown(&self) -> &DisplayLines {
        &self.shown
    }
}

fn printable(line: &str) -> String {
    line.replace(MORE_MARKER, ">")
}

impl CharacterDisplay for HeadlessDisplay {
    fn write_lines(&mut self, lines: &DisplayLines) -> io::Result<()> {
        if *lines == self.shown {
            return Ok(());
        }
        info!(
            "display: [{}] [{}]",
            printable(&lines.first),
            printable(&lines.second)
        );
        self.shown = lines.clone();
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> io::Result<()> {
        let Some(path) = &self.backlight_path else {
            return Ok(());
        };
        let val = if on { "1" } else { "0" };
        std::fs::write(path, val).inspect_err(|e| {
            error!("failed to set backlight via {}: {e}", path.display());
        })
    }
}
