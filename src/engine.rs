// src/engine.rs
//! Engine abstraction: the embedded browser engine is a black box behind
//! [`EngineBackend`] / [`BrowserHost`], calling back into the bridge through
//! the narrow sink traits composed by [`EngineClient`].

pub mod backend;
pub mod null;

pub use backend::*;
