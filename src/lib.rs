pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod fs;
pub mod memstore;
pub mod pathmap;
pub mod store;
mod util;

pub use cache::MetadataCache;
pub use config::MountConfig;
pub use content::FileContext;
pub use error::{FsResult, FsStatus, RemoteError};
pub use fs::{BlobFs, DiskSpace, FileInfo, Handle, OpenMode, VolumeInfo};
pub use memstore::MemoryBlobStore;
pub use pathmap::PathMapper;
pub use store::{BlobItemInfo, BlobStore, ByteStream, ItemKind};
