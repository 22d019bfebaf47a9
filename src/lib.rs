//! Column-reference and merge/split engine for measurement data.
//!
//! Imported entries are grouped into samples and datasets, laid out side by side in one
//! flat table per dataset, processed by named functions that address columns through
//! reference maps, then written to a workbook and split back into entries.

pub mod config;
pub mod data;
pub mod dispatch;
pub mod error;
pub mod labels;
pub mod layout;
pub mod pipeline;
pub mod source;
pub mod styles;
pub mod writer;
