pub mod guard;
pub mod host;
pub mod http;
pub mod model;
pub mod service;

pub use guard::ensure_owner;
pub use host::{MediaHost, UploadedMedia};
pub use model::{Artifact, ArtifactUpdate, AspectRatio, NewArtifact, Transformation, TransformationKind};
pub use service::*;
