//! Dataset loading and splitting
//!
//! CSV ingestion with schema inference, file inspection helpers, and the
//! seeded train/test split used by the forecast pipeline.

mod loader;
mod split;

pub use loader::{DataLoader, DataSaver, FileInfo};
pub use split::{train_test_split, SplitConfig};
