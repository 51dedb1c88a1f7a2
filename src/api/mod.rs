//! API handlers for the Sightline REST endpoints

pub mod health;
pub mod openapi;
pub mod statistics;
