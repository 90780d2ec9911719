//! Pluggable storage backends for Waypost.

pub mod driver;
pub mod error;
pub mod local;
pub mod yandex_disk;

pub use driver::{ByteStream, EntryKind, StorageDriver, StorageEntry};
pub use error::{Result, StorageError};
pub use local::LocalFsStorage;
pub use yandex_disk::YandexDiskStorage;
