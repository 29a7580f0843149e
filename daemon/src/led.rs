//! LED hardware sink.
//!
//! Pixel writes only touch an in-memory buffer; nothing reaches the strip
//! until [`LedStrip::show`].

use std::fmt::Debug;

use ledpanel::RGB8;
use log::{debug, warn};
use smart_leds::{SmartLedsWrite, brightness};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedError {
    #[error("pixel index {index} is outside a strip of {len} pixels")]
    OutOfRange { index: usize, len: usize },
    #[error("failed to write to LED strip: {0}")]
    Write(String),
}

pub trait LedStrip: Send {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_pixel_color(&mut self, index: usize, color: RGB8) -> Result<(), LedError>;

    fn set_brightness(&mut self, level: u8);

    fn show(&mut self) -> Result<(), LedError>;
}

/// Buffers a full strip and pushes it through a `smart-leds` writer.
pub struct SmartLedStrip<W> {
    writer: W,
    pixels: Vec<RGB8>,
    max_brightness: u8,
    level: u8,
}

impl<W> SmartLedStrip<W>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    pub fn new(writer: W, len: usize, max_brightness: u8) -> Self {
        Self {
            writer,
            pixels: vec![RGB8::default(); len],
            max_brightness,
            level: max_brightness,
        }
    }

    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    pub fn brightness(&self) -> u8 {
        self.level
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl<W> LedStrip for SmartLedStrip<W>
where
    W: SmartLedsWrite<Color = RGB8> + Send,
    W::Error: Debug,
{
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel_color(&mut self, index: usize, color: RGB8) -> Result<(), LedError> {
        let len = self.pixels.len();
        let pixel = self
            .pixels
            .get_mut(index)
            .ok_or(LedError::OutOfRange { index, len })?;
        *pixel = color;
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) {
        if level > self.max_brightness {
            warn!(
                "brightness {level} is above the configured maximum {}, clamping",
                self.max_brightness
            );
        }
        self.level = level.min(self.max_brightness);
    }

    fn show(&mut self) -> Result<(), LedError> {
        self.writer
            .write(brightness(self.pixels.iter().copied(), self.level))
            .map_err(|e| LedError::Write(format!("{e:?}")))
    }
}

/// Stand-in writer for machines without an LED strip attached.
#[derive(Debug, Default)]
pub struct LogWriter {
    frames: usize,
}

impl LogWriter {
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl SmartLedsWrite for LogWriter {
    type Error = std::convert::Infallible;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let lit = iterator
            .into_iter()
            .map(|color| -> RGB8 { color.into() })
            .filter(|color| *color != RGB8::default())
            .count();
        self.frames += 1;
        debug!("frame {}: {lit} pixels lit", self.frames);
        Ok(())
    }
}
