//! Spies standing in for the network client and the LED strip in unit tests.

use std::sync::{Arc, Mutex};

use ledpanel::RGB8;
use ledpanel::plan::{PanelAddress, PanelGeometry};

use crate::client::{ClientError, LightingClient};
use crate::led::{LedError, LedStrip};
use crate::panel::PanelController;

#[derive(Clone, Default)]
pub struct SpyClient {
    pub registered: Arc<Mutex<Vec<u16>>>,
    pub fail_on: Option<u16>,
}

impl SpyClient {
    pub fn registered(&self) -> Vec<u16> {
        self.registered.lock().unwrap().clone()
    }
}

impl LightingClient for SpyClient {
    fn register_universe(&mut self, universe: u16) -> Result<(), ClientError> {
        if self.fail_on == Some(universe) {
            return Err(ClientError::Register {
                universe,
                reason: "spy refused".to_string(),
            });
        }
        self.registered.lock().unwrap().push(universe);
        Ok(())
    }

    fn unregister_universe(&mut self, universe: u16) {
        self.registered.lock().unwrap().retain(|u| *u != universe);
    }
}

#[derive(Debug, Default)]
pub struct StripState {
    pub pixels: Vec<RGB8>,
    pub brightness: u8,
    pub shows: usize,
    /// Pixel buffer as of each `show`.
    pub shown: Vec<Vec<RGB8>>,
}

#[derive(Clone)]
pub struct SpyStrip(pub Arc<Mutex<StripState>>);

impl SpyStrip {
    pub fn new(len: usize) -> Self {
        Self(Arc::new(Mutex::new(StripState {
            pixels: vec![RGB8::default(); len],
            brightness: 255,
            ..Default::default()
        })))
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, StripState> {
        self.0.lock().unwrap()
    }
}

impl LedStrip for SpyStrip {
    fn len(&self) -> usize {
        self.state().pixels.len()
    }

    fn set_pixel_color(&mut self, index: usize, color: RGB8) -> Result<(), LedError> {
        let mut state = self.state();
        let len = state.pixels.len();
        *state
            .pixels
            .get_mut(index)
            .ok_or(LedError::OutOfRange { index, len })? = color;
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) {
        self.state().brightness = level;
    }

    fn show(&mut self) -> Result<(), LedError> {
        let mut state = self.state();
        state.shows += 1;
        let pixels = state.pixels.clone();
        state.shown.push(pixels);
        Ok(())
    }
}

/// A `size`x`size` panel at universe 0, channel 0, with max brightness 200.
pub fn panel(size: usize, client: SpyClient, strip: SpyStrip) -> PanelController {
    PanelController::new(
        PanelGeometry::square(size),
        PanelAddress::new(0, 0).unwrap(),
        Box::new(client),
        Box::new(strip),
        200,
    )
    .unwrap()
}
