//! Command implementations and terminal rendering.

pub mod classes;
pub mod listing;
pub mod prices;
pub mod setup;
pub mod show;
pub mod ui;
pub mod validate;
