// In-memory resource store for the Maestro control plane

pub mod manifest;
pub mod store;

pub use manifest::{load_dir, parse_manifests, ManifestError};
pub use store::{ChangeEvent, ChangeOp, ResourceStore, StoreError};
