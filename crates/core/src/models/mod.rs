//! Data models for Lectern

mod attendance;
mod focus;
mod participant;
mod presentation;

pub use attendance::*;
pub use focus::*;
pub use participant::*;
pub use presentation::*;
