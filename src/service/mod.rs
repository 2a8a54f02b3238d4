pub mod mapping;
pub mod storage;

pub use mapping::{MappingField, kafka_json_mapping};
pub use storage::{StorageError, StorageService, StorageTemplate, UpdateStep};
