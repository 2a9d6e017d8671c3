//! Registry core: validation, metadata, storage, scanning and watching

pub mod audio_registry;
pub mod catalog_store;
pub mod change_watcher;
pub mod file_scanner;
pub mod format_validator;
pub mod metadata_builder;

pub use audio_registry::{AudioRegistry, RegistryConfig, RegistryError};
pub use change_watcher::WatcherStatus;
