//! Presentation model for the hazard-exposure map: layer catalog plus a
//! pure view-state machine. No rendering dependency.

pub mod layers;
pub mod state;
