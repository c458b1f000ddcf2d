//! Documentation side of pubkit.
//!
//! Stages the operator's Jekyll sources together with the bundled theme,
//! generated reference docs and the release index, then either serves the
//! result locally or pushes it to the pages branch.

pub mod index;
pub mod pages;
pub mod pipeline;
pub mod templates;
pub mod theme;

pub use index::{DocSet, IndexError, ReleaseIndex};
pub use pages::{GitPages, PagesRepository};
pub use pipeline::{
    DocsConfig, DocsError, DocsPipeline, PublishSummary, ReferenceDocs, StagingContext,
    StagingMode,
};
pub use templates::{scaffold, ScaffoldContext, ScaffoldError, ScaffoldReport};
