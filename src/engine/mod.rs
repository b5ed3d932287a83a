//! Engine module - request/result types, the generator trait, and per-engine handlers

pub mod adapter;
pub mod cloud;
pub mod public;
pub mod structured;
pub mod traits;

pub use adapter::EngineAdapter;
pub use cloud::AspectRatio;
pub use public::prompt_seed;
pub use traits::{
    EngineKind, GenerationRequest, GenerationResult, ImageGenerator, MAX_DIMENSION, MAX_VARIATIONS,
};
