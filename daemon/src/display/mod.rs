use std::io;

use ledpanel::screen::DisplayLines;

pub mod headless;

/// A two-line character display with an optional backlight.
pub trait CharacterDisplay: Send {
    fn write_lines(&mut self, lines: &DisplayLines) -> io::Result<()>;

    fn set_backlight(&mut self, on: bool) -> io::Result<()>;

    /// Blanks the display and switches the backlight off.
    fn close(&mut self) -> io::Result<()> {
        self.write_lines(&DisplayLines::default())?;
        self.set_backlight(false)
    }
}
