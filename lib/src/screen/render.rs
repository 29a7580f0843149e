use super::{
    DISPLAY_WIDTH, MACRO_RUNNING_TEXT, MACRO_STOPPED_TEXT, MORE_MARKER, ScreenError, ScreenId,
    ScreenKind, ScreenTree, TOGGLE_OFF_TEXT, TOGGLE_ON_TEXT,
};

/// The two display lines for a screen, already cut to [`DISPLAY_WIDTH`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayLines {
    pub first: String,
    pub second: String,
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

fn with_marker(text: &str) -> String {
    let mut line = String::with_capacity(DISPLAY_WIDTH);
    line.push(MORE_MARKER);
    line.push_str(&truncate(text, DISPLAY_WIDTH - 1));
    line
}

impl ScreenTree {
    /// Computes what the display shows for screen `id`. Nothing is cached;
    /// call again after every input.
    pub fn render(&self, id: ScreenId) -> Result<DisplayLines, ScreenError> {
        let screen = self.get(id)?;
        let second = match screen.kind() {
            ScreenKind::Start { text } => truncate(text, DISPLAY_WIDTH),
            ScreenKind::Menu => match self.selected_child(id) {
                Ok(child) => with_marker(self.get(child)?.name()),
                Err(_) => String::new(),
            },
            ScreenKind::Value { value, .. } => with_marker(&value.to_string()),
            ScreenKind::Toggle { state: true } => with_marker(TOGGLE_ON_TEXT),
            ScreenKind::Toggle { state: false } => with_marker(TOGGLE_OFF_TEXT),
            ScreenKind::Information { value } => truncate(value, DISPLAY_WIDTH),
            ScreenKind::Macro { running: true } => MACRO_RUNNING_TEXT.to_string(),
            ScreenKind::Macro { running: false } => MACRO_STOPPED_TEXT.to_string(),
        };
        Ok(DisplayLines {
            first: truncate(screen.name(), DISPLAY_WIDTH),
            second,
        })
    }
}
