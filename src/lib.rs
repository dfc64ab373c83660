pub mod app;
pub mod config;
pub mod display;
pub mod error;
pub mod format;
pub mod gate;
pub mod normalize;
pub mod sample;
