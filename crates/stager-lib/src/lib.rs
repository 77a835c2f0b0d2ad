pub mod chart;
pub mod config;
pub mod error;
pub mod index;
pub mod label;
pub mod progress;
pub mod selection;
pub mod session;
pub mod store;
pub mod summary;
pub mod transcode;

pub use error::{AnnotateError, Result};
pub use index::{FileEntry, MetadataIndex, SegmentKey, SegmentRef};
pub use label::Label;
pub use progress::Progress;
pub use selection::Selection;
pub use session::{Event, Outcome, Session, ViewModel};
pub use store::AnnotationStore;
