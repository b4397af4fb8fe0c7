//! Shared data model for the oxcheck pipeline.
//!
//! Everything that crosses a crate boundary lives here: service states and
//! results, metric values, autocheck records, parameter mappings and the raw
//! string tables delivered by the transport layer.

pub mod id;
pub mod params;
pub mod types;

#[cfg(test)]
mod tests;
