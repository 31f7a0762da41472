pub mod array_store;
pub mod connectivity;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod tabular;

pub use dataset::{load_dataset, DatasetLoader, DatasetSplits, PreparedDataset};
pub use error::PrepError;
pub use layout::{DatasetLayout, SplitSizes};
