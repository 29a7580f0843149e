//! Hardware-free core of the LED panel controller: how a panel is spread
//! over lighting-network universes, how universe data becomes pixel writes,
//! the operator menu, and the built-in test pattern.

/// Initialize logging with the given default level. Respects `RUST_LOG`
/// overrides.
pub fn init_logging(default_level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

pub mod frame;
pub mod pattern;
pub mod plan;
pub mod screen;

// re-export the color type, since it's part of our API
pub use smart_leds::RGB8;
