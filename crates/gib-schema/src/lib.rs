pub mod layer;
pub mod manifest;
pub mod version;

// Re-exports
pub use layer::{Channel, LayerName, LayerNameError, LAYER_EXT};
pub use manifest::{Manifest, PlatformEntry};
pub use version::{VersionKey, VersionPattern};
