use log::{debug, error};

use super::{Button, Change, Screen, ScreenError, ScreenId, ScreenKind};

/// Result of one button press: the screen to show next and what, if
/// anything, the owner of the tree should do about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub next: ScreenId,
    pub change: Option<Change>,
}

impl Outcome {
    fn stay(id: ScreenId) -> Self {
        Self {
            next: id,
            change: None,
        }
    }

    fn with_change(id: ScreenId, change: Change) -> Self {
        Self {
            next: id,
            change: Some(change),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScreenTree {
    screens: Vec<Screen>,
}

impl ScreenTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ScreenKind,
    ) -> ScreenId {
        self.screens.push(Screen::new(id.into(), name.into(), kind));
        ScreenId(self.screens.len() - 1)
    }

    pub fn get(&self, id: ScreenId) -> Result<&Screen, ScreenError> {
        self.screens.get(id.0).ok_or(ScreenError::UnknownScreen(id))
    }

    fn get_mut(&mut self, id: ScreenId) -> Result<&mut Screen, ScreenError> {
        self.screens
            .get_mut(id.0)
            .ok_or(ScreenError::UnknownScreen(id))
    }

    /// Looks a screen up by its string id.
    pub fn find(&self, id: &str) -> Option<ScreenId> {
        self.screens
            .iter()
            .position(|screen| screen.id == id)
            .map(ScreenId)
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    fn violation(&self, id: ScreenId, reason: &'static str) -> ScreenError {
        ScreenError::StructuralViolation {
            screen: self.label(id),
            reason,
        }
    }

    fn navigation(&self, id: ScreenId, reason: &'static str) -> ScreenError {
        ScreenError::Navigation {
            screen: self.label(id),
            reason,
        }
    }

    fn label(&self, id: ScreenId) -> String {
        self.get(id)
            .map(|screen| screen.id.clone())
            .unwrap_or_else(|_| format!("{id:?}"))
    }

    fn is_ancestor(&self, candidate: ScreenId, of: ScreenId) -> bool {
        let mut cursor = self.get(of).ok().and_then(Screen::parent);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.get(id).ok().and_then(Screen::parent);
        }
        false
    }

    /// Makes `child` the last child of `parent`.
    ///
    /// Rejected without touching the tree when `parent` is an end screen,
    /// `child` is a start screen, `child` already hangs under another screen,
    /// or the link would close a cycle.
    pub fn attach(&mut self, parent: ScreenId, child: ScreenId) -> Result<(), ScreenError> {
        let parent_screen = self.get(parent)?;
        let child_screen = self.get(child)?;

        if !parent_screen.kind.accepts_children() {
            return Err(self.violation(parent, "end screens cannot have children"));
        }
        if matches!(child_screen.kind, ScreenKind::Start { .. }) {
            return Err(self.violation(child, "a start screen cannot have a parent"));
        }
        match child_screen.parent {
            Some(existing) if existing == parent => return Ok(()),
            Some(_) => return Err(self.violation(child, "screen already has a parent")),
            None => {}
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(self.violation(child, "attaching would create a cycle"));
        }

        self.get_mut(child)?.parent = Some(parent);
        let parent_screen = self.get_mut(parent)?;
        parent_screen.children.push(child);
        parent_screen.selected_child = Some(0);
        Ok(())
    }

    pub fn detach(&mut self, parent: ScreenId, child: ScreenId) -> Result<(), ScreenError> {
        if self.get(child)?.parent != Some(parent) {
            return Err(self.violation(child, "screen is not a child of the given parent"));
        }

        self.get_mut(child)?.parent = None;
        let parent_screen = self.get_mut(parent)?;
        parent_screen.children.retain(|id| *id != child);
        parent_screen.selected_child = if parent_screen.children.is_empty() {
            None
        } else {
            Some(0)
        };
        Ok(())
    }

    /// Moves a container's selection to `index`.
    pub fn select(&mut self, menu: ScreenId, index: usize) -> Result<(), ScreenError> {
        if index >= self.get(menu)?.children.len() {
            return Err(self.navigation(menu, "selection out of range"));
        }
        self.get_mut(menu)?.selected_child = Some(index);
        Ok(())
    }

    pub fn selected_child(&self, id: ScreenId) -> Result<ScreenId, ScreenError> {
        let screen = self.get(id)?;
        match screen.selected_child {
            None => Err(self.navigation(id, "no child is selected")),
            Some(index) => screen
                .children
                .get(index)
                .copied()
                .ok_or_else(|| self.navigation(id, "selected child is out of range")),
        }
    }

    pub fn parent(&self, id: ScreenId) -> Result<ScreenId, ScreenError> {
        self.get(id)?
            .parent
            .ok_or_else(|| self.navigation(id, "screen has no parent"))
    }

    /// Marks a test pattern screen as stopped or running without going
    /// through input handling, e.g. when a non-repeating pattern ends.
    pub fn set_macro_running(&mut self, id: ScreenId, running: bool) -> Result<(), ScreenError> {
        match &mut self.get_mut(id)?.kind {
            ScreenKind::Macro { running: current } => {
                *current = running;
                Ok(())
            }
            _ => Err(self.violation(id, "not a test pattern screen")),
        }
    }

    /// Applies a button press to `current`. Errors are logged and leave the
    /// menu where it was.
    pub fn handle(&mut self, current: ScreenId, button: Button) -> Outcome {
        let result = match button {
            Button::Up => self.on_up(current),
            Button::Down => self.on_down(current),
            Button::Ok => self.on_ok(current),
            Button::Back => self.on_back(current),
        };
        result.unwrap_or_else(|e| {
            error!("{e}");
            Outcome::stay(current)
        })
    }

    pub fn on_up(&mut self, id: ScreenId) -> Result<Outcome, ScreenError> {
        let screen = self.get_mut(id)?;
        let child_count = screen.children.len();
        let change = match &mut screen.kind {
            ScreenKind::Menu => {
                if let Some(selected) = &mut screen.selected_child {
                    *selected = (*selected + 1) % child_count;
                }
                None
            }
            ScreenKind::Value {
                value,
                minimum,
                maximum,
                ..
            } => {
                match *maximum {
                    Some(max) if *value >= max => {
                        if let Some(min) = *minimum {
                            *value = min;
                        }
                    }
                    _ => *value = value.saturating_add(1),
                }
                None
            }
            ScreenKind::Toggle { state } => set_toggle(id, state, true),
            ScreenKind::Macro { running } => {
                if *running {
                    None
                } else {
                    *running = true;
                    Some(Change::MacroStarted { screen: id })
                }
            }
            ScreenKind::Start { .. } | ScreenKind::Information { .. } => None,
        };
        Ok(Outcome {
            next: id,
            change,
        })
    }

    pub fn on_down(&mut self, id: ScreenId) -> Result<Outcome, ScreenError> {
        let screen = self.get_mut(id)?;
        let child_count = screen.children.len();
        let change = match &mut screen.kind {
            ScreenKind::Menu => {
                if let Some(selected) = &mut screen.selected_child {
                    *selected = (*selected + child_count - 1) % child_count;
                }
                None
            }
            ScreenKind::Value {
                value,
                minimum,
                maximum,
                ..
            } => {
                match *minimum {
                    Some(min) if *value <= min => {
                        if let Some(max) = *maximum {
                            *value = max;
                        }
                    }
                    _ => *value = value.saturating_sub(1),
                }
                None
            }
            ScreenKind::Toggle { state } => set_toggle(id, state, false),
            ScreenKind::Macro { running } => stop_macro(id, running),
            ScreenKind::Start { .. } | ScreenKind::Information { .. } => None,
        };
        Ok(Outcome {
            next: id,
            change,
        })
    }

    pub fn on_ok(&mut self, id: ScreenId) -> Result<Outcome, ScreenError> {
        match &mut self.get_mut(id)?.kind {
            ScreenKind::Start { .. } | ScreenKind::Menu => {
                let child = self.selected_child(id)?;
                Ok(Outcome::stay(child))
            }
            ScreenKind::Value {
                value, committed, ..
            } => {
                *committed = *value;
                let change = Change::ValueCommitted {
                    screen: id,
                    value: *value,
                };
                Ok(self.leave(id, change))
            }
            ScreenKind::Toggle { state } => {
                *state = !*state;
                let change = Change::Toggled {
                    screen: id,
                    state: *state,
                };
                Ok(Outcome::with_change(id, change))
            }
            ScreenKind::Macro { running } => {
                *running = !*running;
                let change = if *running {
                    Change::MacroStarted { screen: id }
                } else {
                    Change::MacroStopped { screen: id }
                };
                Ok(Outcome::with_change(id, change))
            }
            ScreenKind::Information { .. } => Ok(Outcome::stay(id)),
        }
    }

    pub fn on_back(&mut self, id: ScreenId) -> Result<Outcome, ScreenError> {
        let change = match &mut self.get_mut(id)?.kind {
            // the root has nowhere to go back to
            ScreenKind::Start { .. } => return Ok(Outcome::stay(id)),
            ScreenKind::Value {
                value, committed, ..
            } => {
                *value = *committed;
                None
            }
            ScreenKind::Macro { running } => stop_macro(id, running),
            ScreenKind::Menu | ScreenKind::Toggle { .. } | ScreenKind::Information { .. } => None,
        };
        match change {
            Some(change) => Ok(self.leave(id, change)),
            None => Ok(Outcome::stay(self.parent(id)?)),
        }
    }

    /// Goes to the parent after a change has already been applied. The change
    /// is reported even if there is no parent to go to.
    fn leave(&self, id: ScreenId, change: Change) -> Outcome {
        match self.parent(id) {
            Ok(parent) => Outcome::with_change(parent, change),
            Err(e) => {
                error!("{e}");
                Outcome::with_change(id, change)
            }
        }
    }
}

fn set_toggle(id: ScreenId, state: &mut bool, target: bool) -> Option<Change> {
    if *state == target {
        debug!("toggle {id:?} already {target}");
        return None;
    }
    *state = target;
    Some(Change::Toggled {
        screen: id,
        state: target,
    })
}

fn stop_macro(id: ScreenId, running: &mut bool) -> Option<Change> {
    if !*running {
        return None;
    }
    *running = false;
    Some(Change::MacroStopped { screen: id })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Menu {
        tree: ScreenTree,
        home: ScreenId,
        menu: ScreenId,
        universe: ScreenId,
        address: ScreenId,
        blackout: ScreenId,
        pattern: ScreenId,
        info: ScreenId,
    }

    fn menu() -> Menu {
        let mut tree = ScreenTree::new();
        let home = tree.add("HOME", "LedPanel", ScreenKind::start("hello"));
        let menu = tree.add("MAIN_MENU", "Menu", ScreenKind::Menu);
        let universe = tree.add("UNIVERSE", "Universe", ScreenKind::value(0, Some(0), None));
        let address = tree.add("ADDRESS", "Address", ScreenKind::value(1, Some(1), Some(512)));
        let blackout = tree.add("BLACKOUT", "Blackout", ScreenKind::toggle(false));
        let pattern = tree.add("TEST", "Test", ScreenKind::test_pattern());
        let info = tree.add("IP", "IP", ScreenKind::information("10.0.0.2"));
        tree.attach(home, menu).unwrap();
        for child in [universe, address, blackout, pattern, info] {
            tree.attach(menu, child).unwrap();
        }
        Menu {
            tree,
            home,
            menu,
            universe,
            address,
            blackout,
            pattern,
            info,
        }
    }

    fn value(tree: &ScreenTree, id: ScreenId) -> i64 {
        match tree.get(id).unwrap().kind() {
            ScreenKind::Value { value, .. } => *value,
            other => panic!("not a value screen: {other:?}"),
        }
    }

    #[test]
    fn test_menu_selection_wraps() {
        let mut tree = ScreenTree::new();
        let menu = tree.add("M", "Menu", ScreenKind::Menu);
        for name in ["a", "b", "c"] {
            let child = tree.add(name, name, ScreenKind::information(""));
            tree.attach(menu, child).unwrap();
        }

        tree.select(menu, 2).unwrap();
        tree.on_down(menu).unwrap();
        assert_eq!(tree.get(menu).unwrap().selected_child(), Some(1));

        tree.select(menu, 2).unwrap();
        tree.on_up(menu).unwrap();
        assert_eq!(tree.get(menu).unwrap().selected_child(), Some(0));

        tree.on_down(menu).unwrap();
        assert_eq!(tree.get(menu).unwrap().selected_child(), Some(2));
    }

    #[test]
    fn test_unbounded_value_never_wraps() {
        let mut m = menu();
        for _ in 0..1000 {
            m.tree.on_up(m.universe).unwrap();
        }
        assert_eq!(value(&m.tree, m.universe), 1000);

        let mut m = menu();
        m.tree.on_down(m.universe).unwrap();
        assert_eq!(value(&m.tree, m.universe), 0);
    }

    #[test]
    fn test_bounded_value_wraps() {
        let mut m = menu();
        m.tree.on_down(m.address).unwrap();
        assert_eq!(value(&m.tree, m.address), 512);
        m.tree.on_up(m.address).unwrap();
        assert_eq!(value(&m.tree, m.address), 1);
    }

    #[test]
    fn test_value_ok_commits_and_back_cancels() {
        let mut m = menu();
        m.tree.on_up(m.address).unwrap();
        let outcome = m.tree.on_ok(m.address).unwrap();
        assert_eq!(outcome.next, m.menu);
        assert_eq!(
            outcome.change,
            Some(Change::ValueCommitted {
                screen: m.address,
                value: 2,
            })
        );

        m.tree.on_up(m.address).unwrap();
        m.tree.on_up(m.address).unwrap();
        let outcome = m.tree.on_back(m.address).unwrap();
        assert_eq!(outcome, Outcome::stay(m.menu));
        assert_eq!(value(&m.tree, m.address), 2);
    }

    #[test]
    fn test_toggle_reports_only_real_changes() {
        let mut m = menu();
        let changes: Vec<_> = (0..2)
            .filter_map(|_| m.tree.on_up(m.blackout).unwrap().change)
            .collect();
        assert_eq!(
            changes,
            vec![Change::Toggled {
                screen: m.blackout,
                state: true,
            }]
        );
        assert!(m.tree.on_down(m.blackout).unwrap().change.is_some());
        assert!(m.tree.on_down(m.blackout).unwrap().change.is_none());

        let outcome = m.tree.on_ok(m.blackout).unwrap();
        assert_eq!(
            outcome.change,
            Some(Change::Toggled {
                screen: m.blackout,
                state: true,
            })
        );
    }

    #[test]
    fn test_macro_up_only_starts_down_only_stops() {
        let mut m = menu();
        let started = Some(Change::MacroStarted { screen: m.pattern });
        let stopped = Some(Change::MacroStopped { screen: m.pattern });

        assert_eq!(m.tree.on_up(m.pattern).unwrap().change, started);
        assert_eq!(m.tree.on_up(m.pattern).unwrap().change, None);
        assert_eq!(m.tree.on_down(m.pattern).unwrap().change, stopped);
        assert_eq!(m.tree.on_down(m.pattern).unwrap().change, None);

        assert_eq!(m.tree.on_ok(m.pattern).unwrap().change, started);
        let outcome = m.tree.on_back(m.pattern).unwrap();
        assert_eq!(outcome.next, m.menu);
        assert_eq!(outcome.change, stopped);
    }

    #[test]
    fn test_information_ignores_input_but_back() {
        let mut m = menu();
        for button in [Button::Up, Button::Down, Button::Ok] {
            assert_eq!(m.tree.handle(m.info, button), Outcome::stay(m.info));
        }
        assert_eq!(m.tree.handle(m.info, Button::Back), Outcome::stay(m.menu));
    }

    #[test]
    fn test_navigation() {
        let mut m = menu();
        assert_eq!(m.tree.handle(m.home, Button::Ok).next, m.menu);
        assert_eq!(m.tree.handle(m.menu, Button::Ok).next, m.universe);
        assert_eq!(m.tree.handle(m.universe, Button::Back).next, m.menu);
        assert_eq!(m.tree.handle(m.menu, Button::Back).next, m.home);
        assert_eq!(m.tree.handle(m.home, Button::Back).next, m.home);
    }

    #[test]
    fn test_ok_without_children_stays() {
        let mut tree = ScreenTree::new();
        let menu = tree.add("EMPTY", "Empty", ScreenKind::Menu);
        assert!(matches!(
            tree.on_ok(menu),
            Err(ScreenError::Navigation { .. })
        ));
        assert_eq!(tree.handle(menu, Button::Ok), Outcome::stay(menu));
        assert_eq!(tree.handle(menu, Button::Up), Outcome::stay(menu));
    }

    #[test]
    fn test_back_without_parent_stays() {
        let mut tree = ScreenTree::new();
        let orphan = tree.add("ORPHAN", "Orphan", ScreenKind::toggle(false));
        assert!(matches!(
            tree.on_back(orphan),
            Err(ScreenError::Navigation { .. })
        ));
        assert_eq!(tree.handle(orphan, Button::Back), Outcome::stay(orphan));
    }

    #[test]
    fn test_structural_violations_leave_tree_unchanged() {
        let mut m = menu();
        let other_home = m.tree.add("HOME2", "Home", ScreenKind::start(""));
        assert!(matches!(
            m.tree.attach(m.menu, other_home),
            Err(ScreenError::StructuralViolation { .. })
        ));
        assert!(m.tree.attach(m.blackout, m.info).is_err());
        assert!(m.tree.attach(m.menu, m.home).is_err());
        assert!(m.tree.attach(m.home, m.universe).is_err());
        assert_eq!(m.tree.get(m.home).unwrap().children(), &[m.menu]);
        assert_eq!(m.tree.get(m.universe).unwrap().parent(), Some(m.menu));

        let submenu = m.tree.add("SUB", "Sub", ScreenKind::Menu);
        m.tree.attach(m.menu, submenu).unwrap();
        assert!(m.tree.attach(submenu, m.menu).is_err());
    }

    #[test]
    fn test_detach_resets_selection() {
        let mut m = menu();
        m.tree.select(m.menu, 3).unwrap();
        m.tree.detach(m.menu, m.pattern).unwrap();
        let menu = m.tree.get(m.menu).unwrap();
        assert_eq!(menu.selected_child(), Some(0));
        assert_eq!(menu.children().len(), 4);
        assert_eq!(m.tree.get(m.pattern).unwrap().parent(), None);
        assert!(m.tree.detach(m.menu, m.pattern).is_err());

        m.tree.detach(m.home, m.menu).unwrap();
        assert_eq!(m.tree.get(m.home).unwrap().selected_child(), None);
    }

    #[test]
    fn test_find_and_set_macro_running() {
        let mut m = menu();
        assert_eq!(m.tree.find("TEST"), Some(m.pattern));
        assert_eq!(m.tree.find("NOPE"), None);
        m.tree.set_macro_running(m.pattern, true).unwrap();
        assert_eq!(
            m.tree.get(m.pattern).unwrap().kind(),
            &ScreenKind::Macro { running: true }
        );
        assert!(m.tree.set_macro_running(m.info, true).is_err());
    }
}
