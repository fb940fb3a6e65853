//! EWF (Expert Witness Format / E01) container support.
//!
//! EWF1 images store the acquired disk as zlib-compressed chunks inside a
//! chain of sections, optionally split across `.E01`/`.E02`/... segment
//! files. [`EwfImage`] opens and validates a segment set once;
//! [`EwfHandle`] gives one thread random access to the decompressed
//! contents and plugs into the reader pool as a [`BlockSource`].
//!
//! [`BlockSource`]: crate::pipeline::BlockSource

mod handle;
mod image;
#[cfg(test)]
pub(crate) mod testfixture;
mod types;

pub use handle::EwfHandle;
pub use image::EwfImage;
pub use types::{EwfInfo, StoredImageHash, VolumeSection};
