//! Deterministic pet-state engine: hunger decay, coin economy, feeding
//! cooldown, and special-pet rolls behind a command/snapshot surface.

pub mod engine;
pub mod rng;

pub use engine::PetStateEngine;
pub use rng::SplitMix64;
