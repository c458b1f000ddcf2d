//! Release side of pubkit: build, publish to npm, tag, republish docs.

pub mod clients;
pub mod manifest;
pub mod pipeline;

pub use clients::{DocsPublisher, GitClient, NpmClient, PackageRegistry, SourceControl};
pub use manifest::{ManifestError, PackageManifest};
pub use pipeline::{PublishDetails, ReleaseConfig, ReleaseError, ReleasePipeline, ReleaseSummary};
