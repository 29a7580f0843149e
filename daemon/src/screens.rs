//! The panel's operator menu.
//!
//! Button presses arrive on reader threads; everything they touch (the tree,
//! the current screen and the display) sits behind one lock, so a press is
//! handled and rendered before the next one starts. Anything that touches
//! the panel is posted to the event loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ledpanel::pattern::{Macro, MacroPlayer};
use ledpanel::plan::{PanelAddress, PanelGeometry, UNIVERSE_SIZE};
use ledpanel::screen::{Button, Change, DisplayLines, ScreenError, ScreenId, ScreenKind, ScreenTree};
use log::{debug, error, info};
use tokio::time::Instant;

use crate::display::CharacterDisplay;
use crate::event_loop::LoopHandle;
use crate::panel::PanelController;

/// How long after the timeout the backlight check runs.
const BACKLIGHT_GRACE: Duration = Duration::from_secs(1);

pub struct MenuSettings {
    pub home_text: String,
    pub ip_text: String,
    /// `None` keeps the backlight on.
    pub backlight_timeout: Option<Duration>,
    pub test_pattern: Arc<dyn Macro>,
    pub repeat_test_pattern: bool,
}

/// Handles of the screens the manager reacts to.
#[derive(Clone, Copy, Debug)]
pub struct MenuIds {
    pub home: ScreenId,
    pub main_menu: ScreenId,
    pub universe: ScreenId,
    pub address: ScreenId,
    pub manual: ScreenId,
    pub blackout: ScreenId,
    pub test_pattern: ScreenId,
    pub ip_info: ScreenId,
}

fn build_menu(
    settings: &MenuSettings,
    geometry: PanelGeometry,
    address: PanelAddress,
) -> Result<(ScreenTree, MenuIds), ScreenError> {
    let mut tree = ScreenTree::new();
    let ids = MenuIds {
        home: tree.add(
            "HOME",
            format!("LedPanel {}", geometry.pixel_count()),
            ScreenKind::start(settings.home_text.clone()),
        ),
        main_menu: tree.add("MAIN_MENU", "Menu", ScreenKind::Menu),
        universe: tree.add(
            "UNIVERSE_SELECTOR",
            "Universe",
            ScreenKind::value(i64::from(address.start_universe), Some(0), None),
        ),
        address: tree.add(
            "CHANNEL_SELECTOR",
            "Address",
            ScreenKind::value(
                address.dmx_address() as i64,
                Some(1),
                Some(UNIVERSE_SIZE as i64),
            ),
        ),
        manual: tree.add("MANUAL_MENU", "Manual", ScreenKind::Menu),
        blackout: tree.add("BLACKOUT", "Blackout", ScreenKind::toggle(false)),
        test_pattern: tree.add("TEST_PATTERN", "Test LEDs", ScreenKind::test_pattern()),
        ip_info: tree.add(
            "IP_INFO",
            "IP address",
            ScreenKind::information(settings.ip_text.clone()),
        ),
    };

    tree.attach(ids.home, ids.main_menu)?;
    tree.attach(ids.main_menu, ids.universe)?;
    tree.attach(ids.main_menu, ids.address)?;
    tree.attach(ids.main_menu, ids.manual)?;
    tree.attach(ids.manual, ids.blackout)?;
    tree.attach(ids.manual, ids.test_pattern)?;
    tree.attach(ids.main_menu, ids.ip_info)?;
    Ok((tree, ids))
}

struct Inner {
    tree: ScreenTree,
    current: ScreenId,
    display: Box<dyn CharacterDisplay>,
    backlight_on: bool,
    last_activity: Instant,
    /// Running flag of the current test pattern run, if any.
    playback: Option<Arc<AtomicBool>>,
}

impl Inner {
    fn refresh(&mut self) {
        match self.tree.render(self.current) {
            Ok(lines) => {
                if let Err(e) = self.display.write_lines(&lines) {
                    error!("failed to update display: {e}");
                }
            }
            Err(e) => error!("failed to render screen: {e}"),
        }
    }

    fn set_backlight(&mut self, on: bool) {
        if let Err(e) = self.display.set_backlight(on) {
            error!("failed to switch backlight: {e}");
        }
        self.backlight_on = on;
    }
}

#[derive(Clone)]
pub struct ScreenManager {
    inner: Arc<Mutex<Inner>>,
    ids: MenuIds,
    settings: Arc<MenuSettings>,
    event_loop: LoopHandle,
}

impl ScreenManager {
    /// Builds the menu for a panel currently at `address`, shows the home
    /// screen and switches the backlight on.
    pub fn new(
        settings: MenuSettings,
        geometry: PanelGeometry,
        address: PanelAddress,
        display: Box<dyn CharacterDisplay>,
        event_loop: LoopHandle,
    ) -> Result<Self, ScreenError> {
        let (tree, ids) = build_menu(&settings, geometry, address)?;
        let manager = Self {
            inner: Arc::new(Mutex::new(Inner {
                tree,
                current: ids.home,
                display,
                backlight_on: false,
                last_activity: Instant::now(),
                playback: None,
            })),
            ids,
            settings: Arc::new(settings),
            event_loop,
        };
        {
            let mut inner = manager.lock();
            inner.set_backlight(true);
            inner.refresh();
        }
        manager.schedule_backlight_check();
        Ok(manager)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ids(&self) -> MenuIds {
        self.ids
    }

    pub fn current(&self) -> ScreenId {
        self.lock().current
    }

    pub fn lines(&self) -> Result<DisplayLines, ScreenError> {
        let inner = self.lock();
        inner.tree.render(inner.current)
    }

    pub fn is_backlight_on(&self) -> bool {
        self.lock().backlight_on
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playback.is_some()
    }

    pub fn handle_button(&self, button: Button) {
        let mut inner = self.lock();
        inner.last_activity = Instant::now();
        if !inner.backlight_on {
            inner.set_backlight(true);
        }
        self.schedule_backlight_check();

        let current = inner.current;
        let outcome = inner.tree.handle(current, button);
        debug!("{button:?}: {current:?} -> {:?}", outcome.next);
        inner.current = outcome.next;
        if let Some(change) = outcome.change {
            self.apply_change(&mut inner, change);
        }
        inner.refresh();
    }

    /// Redraws the current screen.
    pub fn refresh(&self) {
        self.lock().refresh();
    }

    fn apply_change(&self, inner: &mut Inner, change: Change) {
        match change {
            Change::ValueCommitted { screen, value } if screen == self.ids.universe => {
                let Ok(universe) = u16::try_from(value) else {
                    error!("universe {value} is out of range");
                    return;
                };
                self.post(move |panel| {
                    if let Err(e) = panel.set_address(Some(universe), None) {
                        error!("failed to change universe: {e}");
                    }
                });
            }
            Change::ValueCommitted { screen, value } if screen == self.ids.address => {
                let Some(channel) = usize::try_from(value).ok().and_then(|v| v.checked_sub(1))
                else {
                    error!("address {value} is out of range");
                    return;
                };
                self.post(move |panel| {
                    if let Err(e) = panel.set_address(None, Some(channel)) {
                        error!("failed to change address: {e}");
                    }
                });
            }
            Change::Toggled { screen, state } if screen == self.ids.blackout => {
                info!("blackout {}", if state { "on" } else { "off" });
                self.post(move |panel| {
                    if let Err(e) = panel.set_on_off(!state) {
                        error!("failed to switch blackout: {e}");
                    }
                });
            }
            Change::MacroStarted { screen } if screen == self.ids.test_pattern => {
                self.start_playback(inner);
            }
            Change::MacroStopped { screen } if screen == self.ids.test_pattern => {
                self.stop_playback(inner);
            }
            other => debug!("nothing to do for {other:?}"),
        }
    }

    fn post<F>(&self, action: F)
    where
        F: FnOnce(&mut PanelController) + Send + 'static,
    {
        if self.event_loop.execute(action).is_err() {
            error!("event loop has stopped, dropping panel change");
        }
    }

    fn start_playback(&self, inner: &mut Inner) {
        let running = Arc::new(AtomicBool::new(true));
        if let Some(previous) = inner.playback.replace(running.clone()) {
            previous.store(false, Ordering::Relaxed);
        }
        info!("starting test pattern");
        let player = MacroPlayer::new(
            self.settings.test_pattern.clone(),
            self.settings.repeat_test_pattern,
        );
        let manager = self.clone();
        self.post(move |panel| {
            panel.unsubscribe();
            manager.play_step(panel, player, running);
        });
    }

    fn stop_playback(&self, inner: &mut Inner) {
        let Some(running) = inner.playback.take() else {
            return;
        };
        running.store(false, Ordering::Relaxed);
        info!("stopping test pattern");
        self.post(resubscribe);
    }

    /// Shows one frame and schedules the next. A stopped run does nothing,
    /// which is how pending steps of an old run are cancelled.
    fn play_step(
        &self,
        panel: &mut PanelController,
        mut player: MacroPlayer,
        running: Arc<AtomicBool>,
    ) {
        if !running.load(Ordering::Relaxed) {
            return;
        }
        let Some(frame) = player.next_frame() else {
            self.finish_playback(panel, &running);
            return;
        };
        if let Err(e) = panel.show_frame(&frame) {
            error!("failed to show test pattern frame: {e}");
        }

        let manager = self.clone();
        let step = player.step_length();
        if self
            .event_loop
            .schedule_delayed(step, move |panel| {
                manager.play_step(panel, player, running)
            })
            .is_err()
        {
            error!("event loop has stopped, ending test pattern");
        }
    }

    /// A non-repeating pattern ran out.
    fn finish_playback(&self, panel: &mut PanelController, running: &Arc<AtomicBool>) {
        running.store(false, Ordering::Relaxed);
        resubscribe(panel);

        let mut inner = self.lock();
        if !inner
            .playback
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, running))
        {
            return;
        }
        inner.playback = None;
        if let Err(e) = inner.tree.set_macro_running(self.ids.test_pattern, false) {
            error!("{e}");
        }
        info!("test pattern finished");
        inner.refresh();
    }

    fn schedule_backlight_check(&self) {
        let Some(timeout) = self.settings.backlight_timeout else {
            return;
        };
        let manager = self.clone();
        if self
            .event_loop
            .schedule_delayed(timeout + BACKLIGHT_GRACE, move |_| manager.backlight_check())
            .is_err()
        {
            debug!("event loop has stopped, backlight stays as it is");
        }
    }

    /// Switches the backlight off if no button was pressed for the timeout.
    pub fn backlight_check(&self) {
        let Some(timeout) = self.settings.backlight_timeout else {
            return;
        };
        let mut inner = self.lock();
        if inner.backlight_on && inner.last_activity.elapsed() >= timeout {
            debug!("no input for {timeout:?}, switching backlight off");
            inner.set_backlight(false);
        }
    }

    /// Stops any running test pattern and releases the display.
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        if let Some(running) = inner.playback.take() {
            running.store(false, Ordering::Relaxed);
        }
        if let Err(e) = inner.display.close() {
            error!("failed to close display: {e}");
        }
        inner.backlight_on = false;
    }
}

fn resubscribe(panel: &mut PanelController) {
    if let Err(e) = panel.subscribe() {
        error!("failed to resubscribe panel: {e}");
    }
}
