pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lookup;
pub mod options;
pub mod parse;
pub mod persist;
pub mod render;
pub mod state;
pub mod wasm;

pub use config::EngineConfig;
pub use engine::FormEngine;
pub use error::EngineError;
