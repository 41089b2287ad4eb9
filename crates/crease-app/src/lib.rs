// Terminal front end for the team builder: configuration, backend wiring,
// and the line-oriented command loop.

pub mod app;
pub mod backend;
pub mod commands;
pub mod config;
pub mod render;
