//! Common imports for typical source usage.
pub use crate::{
    AbortHandle, ConfigFragment, EventStream, KeptnSource, Metadata, Source, SourceError,
    SourceEvent, SourceRegistry, StreamInput, StreamOptions,
};
