//! Core data models for the war tracker.

mod ids;
mod record;
mod stats;
mod views;
mod war;

pub use ids::*;
pub use record::*;
pub use stats::*;
pub use views::*;
pub use war::*;

#[cfg(test)]
pub(crate) use record::fixtures;
