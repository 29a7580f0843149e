//! Pre-scripted full-panel frame sequences used for self test.

use std::sync::Arc;
use std::time::Duration;

use smart_leds::RGB8;

/// A finite sequence of full-panel frames, in pixel-index order.
///
/// Frames are produced on demand, so a sequence can be restarted by simply
/// asking for index 0 again.
pub trait Macro: Send + Sync {
    fn len(&self) -> usize;

    fn frame(&self, index: usize) -> Vec<RGB8>;

    /// How long each frame stays on the panel.
    fn step_length(&self) -> Duration;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lights the whole panel white, then walks a single red, green and blue
/// pixel down every column in turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestPixels {
    columns: usize,
    rows: usize,
}

const TEST_PIXELS_STEP: Duration = Duration::from_millis(500);

impl TestPixels {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self { columns, rows }
    }
}

impl Macro for TestPixels {
    fn len(&self) -> usize {
        self.columns * self.rows * 3 + 1
    }

    fn frame(&self, index: usize) -> Vec<RGB8> {
        let pixel_count = self.columns * self.rows;
        if pixel_count == 0 {
            return Vec::new();
        }
        if index == 0 {
            return vec![RGB8::new(255, 255, 255); pixel_count];
        }

        let mut frame = vec![RGB8::default(); pixel_count];
        let step = index - 1;
        let row = step % self.rows;
        let column = (step / self.rows) % self.columns;
        if let Some(pixel) = frame.get_mut(row * self.columns + column) {
            match step / pixel_count % 3 {
                0 => pixel.r = 255,
                1 => pixel.g = 255,
                _ => pixel.b = 255,
            }
        }
        frame
    }

    fn step_length(&self) -> Duration {
        TEST_PIXELS_STEP
    }
}

/// Playback position in a [`Macro`].
pub struct MacroPlayer {
    pattern: Arc<dyn Macro>,
    index: usize,
    repeat: bool,
}

impl MacroPlayer {
    pub fn new(pattern: Arc<dyn Macro>, repeat: bool) -> Self {
        Self {
            pattern,
            index: 0,
            repeat,
        }
    }

    /// The next frame, wrapping around in repeat mode. `None` once a
    /// non-repeating sequence is exhausted.
    pub fn next_frame(&mut self) -> Option<Vec<RGB8>> {
        if self.index >= self.pattern.len() {
            if !self.repeat || self.pattern.is_empty() {
                return None;
            }
            self.index = 0;
        }
        let frame = self.pattern.frame(self.index);
        self.index += 1;
        Some(frame)
    }

    pub fn restart(&mut self) {
        self.index = 0;
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn step_length(&self) -> Duration {
        self.pattern.step_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(frame: &[RGB8]) -> Vec<(usize, RGB8)> {
        frame
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, color)| *color != RGB8::default())
            .collect()
    }

    #[test]
    fn test_first_frame_is_white() {
        let pattern = TestPixels::new(3, 2);
        assert_eq!(pattern.len(), 19);
        assert!(
            pattern
                .frame(0)
                .iter()
                .all(|color| *color == RGB8::new(255, 255, 255))
        );
    }

    #[test]
    fn test_walks_rows_then_columns_then_colors() {
        let pattern = TestPixels::new(3, 2);
        assert_eq!(lit(&pattern.frame(1)), vec![(0, RGB8::new(255, 0, 0))]);
        // second step: next row, same column
        assert_eq!(lit(&pattern.frame(2)), vec![(3, RGB8::new(255, 0, 0))]);
        assert_eq!(lit(&pattern.frame(3)), vec![(1, RGB8::new(255, 0, 0))]);
        assert_eq!(lit(&pattern.frame(7)), vec![(0, RGB8::new(0, 255, 0))]);
        assert_eq!(lit(&pattern.frame(18)), vec![(5, RGB8::new(0, 0, 255))]);
    }

    #[test]
    fn test_player_repeats() {
        let mut player = MacroPlayer::new(Arc::new(TestPixels::new(1, 1)), true);
        let frames: Vec<_> = (0..5).map(|_| player.next_frame().unwrap()).collect();
        assert_eq!(frames[0], frames[4]);
        assert_eq!(player.position(), 1);
        assert_eq!(player.step_length(), Duration::from_millis(500));
    }

    #[test]
    fn test_player_stops_without_repeat() {
        let mut player = MacroPlayer::new(Arc::new(TestPixels::new(1, 1)), false);
        for _ in 0..4 {
            assert!(player.next_frame().is_some());
        }
        assert!(player.next_frame().is_none());
        player.restart();
        assert!(player.next_frame().is_some());
    }
}
