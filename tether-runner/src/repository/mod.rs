//! Repository layer
//!
//! Repositories are stateless adapters over the provider client. They expose
//! the narrow set of provider operations the services need, without any
//! correlation or polling logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod artifacts;
mod runs;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;

// Re-export traits
pub use artifacts::ArtifactRepository;
pub use runs::RunRepository;

// Re-export implementations
pub use artifacts::HttpArtifactRepository;
pub use runs::HttpRunRepository;
