//! Tabshot Domain Layer
//!
//! Core types shared by every tabshot crate. Nothing here touches the
//! filesystem or the network; those concerns live in `tabshot-llm` and
//! `tabshot-extractor`.
//!
//! ## Key Concepts
//!
//! - **Schema Binding**: per-task descriptor of the record shape to extract,
//!   the instructions sent to the vision backend and how to unpack its answer
//! - **Field Value**: one typed scalar extracted from a screenshot
//! - **Metadata Record**: side-channel attributes of a screenshot (capture time,
//!   participant and device)
//! - **Output Row**: one extracted record joined with its screenshot's metadata,
//!   the unit persisted to a task's output table
//! - **Vision Provider**: the extraction backend boundary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod record;
pub mod schema;
pub mod screenshot;
pub mod traits;

// Re-exports for convenience
pub use record::{
    ExtractedRecord, FieldValue, MetadataRecord, OutputRow, BASE_COLUMNS, FILENAME_COLUMN,
    INVALID_TIMESTAMP, NO_DATA_SENTINEL,
};
pub use schema::{FieldDescriptor, FieldType, SchemaBinding, SchemaError};
pub use screenshot::{Screenshot, IMAGE_EXTENSIONS};
pub use traits::{VisionProvider, VisionRequest};
