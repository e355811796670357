//! Engine module providing the main interface: one prompt in, one report out

mod builder;
mod engine;

pub use builder::EngineBuilder;
pub use engine::ChatEngine;
