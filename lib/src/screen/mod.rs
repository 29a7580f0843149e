//! The operator menu shown on the two-line character display.
//!
//! Screens live in a [`ScreenTree`] arena and refer to each other by
//! [`ScreenId`]. Input handling never touches hardware: it reports where the
//! menu should go next and, optionally, a [`Change`] for the owner of the tree
//! to act on.

use thiserror::Error;

mod render;
mod tree;

pub use render::DisplayLines;
pub use tree::{Outcome, ScreenTree};

/// Characters per display line.
pub const DISPLAY_WIDTH: usize = 20;

/// Custom glyph slot 0 of the display, drawn as an up/down arrow. Prefixes a
/// second line whose content changes with Up/Down.
pub const MORE_MARKER: char = '\u{0}';

pub const TOGGLE_ON_TEXT: &str = "On";
pub const TOGGLE_OFF_TEXT: &str = "Off";
pub const MACRO_RUNNING_TEXT: &str = "Running";
pub const MACRO_STOPPED_TEXT: &str = "Stopped";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Ok,
    Back,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScreenKind {
    /// The root. Never has a parent.
    Start { text: String },
    Menu,
    /// An integer edited in place. `None` bounds are unbounded. Edits are
    /// only kept once confirmed with OK; `committed` is what Back restores.
    Value {
        value: i64,
        committed: i64,
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Toggle { state: bool },
    Information { value: String },
    /// Runs a test pattern while `running`.
    Macro { running: bool },
}

impl ScreenKind {
    pub fn start(text: impl Into<String>) -> Self {
        ScreenKind::Start { text: text.into() }
    }

    pub fn value(initial: i64, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        ScreenKind::Value {
            value: initial,
            committed: initial,
            minimum,
            maximum,
        }
    }

    pub fn toggle(state: bool) -> Self {
        ScreenKind::Toggle { state }
    }

    pub fn information(value: impl Into<String>) -> Self {
        ScreenKind::Information {
            value: value.into(),
        }
    }

    pub fn test_pattern() -> Self {
        ScreenKind::Macro { running: false }
    }

    /// Only containers take children; everything else is an end screen.
    pub fn accepts_children(&self) -> bool {
        matches!(self, ScreenKind::Start { .. } | ScreenKind::Menu)
    }
}

/// Something the owner of the tree has to carry out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    ValueCommitted { screen: ScreenId, value: i64 },
    Toggled { screen: ScreenId, state: bool },
    MacroStarted { screen: ScreenId },
    MacroStopped { screen: ScreenId },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScreenError {
    #[error("screen {screen}: {reason}")]
    StructuralViolation { screen: String, reason: &'static str },
    #[error("cannot navigate from screen {screen}: {reason}")]
    Navigation { screen: String, reason: &'static str },
    #[error("no screen with handle {0:?}")]
    UnknownScreen(ScreenId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Screen {
    id: String,
    name: String,
    kind: ScreenKind,
    parent: Option<ScreenId>,
    children: Vec<ScreenId>,
    selected_child: Option<usize>,
}

impl Screen {
    fn new(id: String, name: String, kind: ScreenKind) -> Self {
        Self {
            id,
            name,
            kind,
            parent: None,
            children: Vec::new(),
            selected_child: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ScreenKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<ScreenId> {
        self.parent
    }

    pub fn children(&self) -> &[ScreenId] {
        &self.children
    }

    pub fn selected_child(&self) -> Option<usize> {
        self.selected_child
    }
}
