//! Asset loading: the resource loader boundary and the async load pipeline
//!
//! File I/O and CPU-side decode run on worker threads; completed results
//! are handed back to the main thread by value and drained once per frame.

pub mod loader;
pub mod pipeline;

pub use loader::{FileResourceLoader, ImageData, LoaderError, ResourceLoader};
pub use pipeline::{LoadCompletion, LoadPayload, LoadPipeline, LoadRequest};
