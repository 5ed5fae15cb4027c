//! Completion provider implementations

pub mod clova;

// Re-export for convenience
pub use clova::ClovaClient;
