//! Pipeline entry points.
//!
//! - `run_pipeline`: Collect, normalize, enrich, and merge one batch
//! - `inspect_dataset`: Describe the stored dataset

pub mod inspect;
pub mod run;

pub use inspect::{DatasetInfo, inspect_dataset};
pub use run::{run_from_config, run_pipeline};
