//! # Integration Flows
//!
//! Cross-module scenarios. Each module covers one externally observable
//! property of the engine.

pub mod fixtures;

mod codec;
mod frames;
mod pricing;
mod self_destruct;
mod token_service;
mod versions;
