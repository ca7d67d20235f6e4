//! gcbridge - wrapper identity and gray-color synchronization between a
//! traced managed heap and reference-counted native objects
//!
//! Objects on each side of the bridge may hold references into the other,
//! forming cycles neither collector can reclaim alone. This crate provides
//! the bridge's core:
//! - `wrapper`: at most one wrapper per (native, domain), classified as
//!   lightweight or heavyweight from a single reserved slot
//! - `gray`: unmarking of gray subgraphs before the native side uses them
//! - `transplant`: all-or-nothing moves of an object into another domain
//! - `generation`: per-pass stamping of cross-boundary variants
//!
//! `heap` and `native` model the two collaborating object systems.

pub mod config;
pub mod error;
pub mod generation;
pub mod gray;
pub mod heap;
pub mod logging;
pub mod native;
pub mod transplant;
pub mod wrapper;

// Re-export core types
pub use config::BridgeConfig;
pub use error::{BridgeError, ConfigError, TransplantError};
pub use generation::{mark_in_generation, CollectionPass, Generation, GenerationCounter};
pub use gray::{
    unmark_gray, unmark_gray_context, unmark_gray_object, unmark_gray_script, GrayMarking,
    HolderRegistry,
};
pub use heap::{AutoRequest, CellId, Color, DomainId, ExecutionContext, GcThing, Heap};
pub use native::{InterfaceSet, NativeObject, NativeRef};
pub use transplant::{transplant, transplant_with_wrapper};
pub use wrapper::{classify, lookup, wrap_native, WrapperKind};

/// Bridge initialization: logging configured from the environment
pub fn init() {
    logging::init();
}

/// Bridge initialization from a loaded configuration
pub fn init_with_config(config: &BridgeConfig) {
    logging::init_with_config(logging::LogConfig::from(&config.logging));
}
