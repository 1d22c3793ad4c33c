//! Control surface for the 8x8 NeoPixel matrix of a microscope illuminator.
//!
//! The pattern engine ([`engine`]) turns the lighting config, the per-pixel
//! overrides ([`grid`]) and the current time into what each LED shows.
//! [`state::ControlSurfaceState`] owns both halves and exposes every
//! mutation; [`scheduler`] decides when animated patterns need new frames.

pub mod cli;
pub mod color;
pub mod config;
pub mod display;
pub mod engine;
pub mod grid;
pub mod ipc;
pub mod lighting;
pub mod logging;
pub mod preset;
pub mod scheduler;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod telemetry;
