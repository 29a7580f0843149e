//! Drives an LED panel from Art-Net and serves its two-line operator menu.

pub mod artnet;
pub mod buttons;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod event_loop;
pub mod led;
pub mod network;
pub mod panel;
pub mod screens;

#[cfg(test)]
mod testing;
