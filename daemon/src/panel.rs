//! The LED panel and its place in the lighting network.
//!
//! A `PanelController` is owned by the event loop and only ever touched from
//! it, so frame delivery, re-addressing and test pattern playback can never
//! interleave.

use std::collections::HashMap;

use ledpanel::RGB8;
use ledpanel::frame::{FrameCache, apply_universe_update};
use ledpanel::plan::{ChannelPlan, PanelAddress, PanelGeometry, PlanError, UniverseSpan};
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::client::{ClientError, LightingClient};
use crate::led::{LedError, LedStrip};

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Led(#[from] LedError),
}

/// Handles updates for one subscribed universe.
#[derive(Clone, Debug)]
struct UniverseHandler {
    span: UniverseSpan,
}

impl UniverseHandler {
    /// Writes the changed pixels of this universe and presents them once.
    /// Returns whether anything was written.
    fn handle(
        &self,
        slots: &[u8],
        cache: &mut FrameCache,
        strip: &mut dyn LedStrip,
    ) -> Result<bool, LedError> {
        let Some(batch) = apply_universe_update(&self.span, slots, cache) else {
            return Ok(false);
        };
        for write in batch {
            strip.set_pixel_color(write.index, write.color)?;
        }
        strip.show()?;
        Ok(true)
    }
}

pub struct PanelController {
    plan: ChannelPlan,
    cache: FrameCache,
    handlers: HashMap<u16, UniverseHandler>,
    client: Box<dyn LightingClient>,
    strip: Box<dyn LedStrip>,
    max_brightness: u8,
}

impl PanelController {
    /// Builds the panel's plan. Nothing is subscribed until
    /// [`subscribe`](Self::subscribe).
    pub fn new(
        geometry: PanelGeometry,
        address: PanelAddress,
        client: Box<dyn LightingClient>,
        strip: Box<dyn LedStrip>,
        max_brightness: u8,
    ) -> Result<Self, PanelError> {
        let plan = ChannelPlan::compute(geometry, address)?;
        if strip.len() < geometry.pixel_count() {
            warn!(
                "LED strip has {} pixels but the panel needs {}",
                strip.len(),
                geometry.pixel_count()
            );
        }
        Ok(Self {
            plan,
            cache: FrameCache::new(),
            handlers: HashMap::new(),
            client,
            strip,
            max_brightness,
        })
    }

    pub fn plan(&self) -> &ChannelPlan {
        &self.plan
    }

    pub fn geometry(&self) -> PanelGeometry {
        self.plan.geometry()
    }

    pub fn address(&self) -> PanelAddress {
        self.plan.address()
    }

    pub fn is_subscribed(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Registers one handler per universe that carries pixel data. If any
    /// registration fails, the ones already made are rolled back.
    ///
    /// The frame cache starts out empty, so the first frame after
    /// subscribing is always drawn even if it matches the last one seen.
    pub fn subscribe(&mut self) -> Result<(), PanelError> {
        if self.is_subscribed() {
            debug!("panel already subscribed");
            return Ok(());
        }
        self.cache.clear();
        let spans = self.plan.spans().to_vec();
        for span in spans {
            if let Err(e) = self.client.register_universe(span.universe) {
                self.unsubscribe();
                return Err(e.into());
            }
            self.handlers
                .insert(span.universe, UniverseHandler { span });
        }
        info!(
            "subscribed to universes {}..={}",
            self.plan.start_universe(),
            self.plan.last_universe()
        );
        Ok(())
    }

    /// Safe to call when nothing is subscribed.
    pub fn unsubscribe(&mut self) {
        for universe in self.handlers.keys() {
            self.client.unregister_universe(*universe);
        }
        if !self.handlers.is_empty() {
            info!("unsubscribed from {} universes", self.handlers.len());
        }
        self.handlers.clear();
    }

    /// Moves the panel to a new start universe and/or start channel. Fields
    /// left as `None` keep their current value.
    ///
    /// The new plan is computed before anything is torn down, so an invalid
    /// address leaves the current plan and subscriptions untouched. The panel
    /// is only resubscribed if it was subscribed before. If the client refuses
    /// one of the new universes, the previous address is restored and
    /// subscribed again before the error is returned.
    pub fn set_address(
        &mut self,
        universe: Option<u16>,
        channel: Option<usize>,
    ) -> Result<(), PanelError> {
        let current = self.plan.address();
        let address = PanelAddress::new(
            universe.unwrap_or(current.start_universe),
            channel.unwrap_or(current.start_channel),
        )?;
        let plan = ChannelPlan::compute(self.plan.geometry(), address)?;

        let was_subscribed = self.is_subscribed();
        self.unsubscribe();
        info!(
            "readdressing panel to universe {} address {}",
            address.start_universe,
            address.dmx_address()
        );
        let previous = std::mem::replace(&mut self.plan, plan);
        self.cache.clear();
        if !was_subscribed {
            return Ok(());
        }
        if let Err(e) = self.subscribe() {
            warn!(
                "keeping universe {} address {}: {e}",
                previous.start_universe(),
                previous.address().dmx_address()
            );
            self.plan = previous;
            self.cache.clear();
            if let Err(e) = self.subscribe() {
                error!("failed to resubscribe to the previous universes: {e}");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Switches the LEDs fully on or off and presents immediately.
    pub fn set_on_off(&mut self, active: bool) -> Result<(), PanelError> {
        let level = if active { self.max_brightness } else { 0 };
        debug!("setting panel brightness to {level}");
        self.strip.set_brightness(level);
        self.strip.show()?;
        Ok(())
    }

    /// Applies one universe's slot data. Frames for universes that are not
    /// subscribed (e.g. still queued from before a readdress) are dropped.
    pub fn handle_universe(&mut self, universe: u16, slots: &[u8]) {
        let Some(handler) = self.handlers.get(&universe) else {
            debug!("dropping frame for unsubscribed universe {universe}");
            return;
        };
        if let Err(e) = self.plan.span(universe) {
            error!("handler outlived its plan: {e}");
            return;
        }
        match handler.handle(slots, &mut self.cache, self.strip.as_mut()) {
            Ok(true) => debug!("updated universe {universe}"),
            Ok(false) => {}
            Err(e) => error!("failed to update universe {universe}: {e}"),
        }
    }

    /// Pushes a full frame, in pixel-index order, straight to the LEDs.
    pub fn show_frame(&mut self, frame: &[RGB8]) -> Result<(), PanelError> {
        for (index, color) in frame.iter().enumerate() {
            self.strip.set_pixel_color(index, *color)?;
        }
        self.strip.show()?;
        Ok(())
    }

    /// Stops listening and turns the LEDs off.
    pub fn shutdown(&mut self) {
        self.unsubscribe();
        if let Err(e) = self.set_on_off(false) {
            error!("failed to switch LEDs off: {e}");
        }
    }
}
