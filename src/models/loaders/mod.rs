pub mod dataset_loader;

pub use dataset_loader::{ensure_unique_ids, load_dataset, load_json_array};
