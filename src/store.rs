use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::error::RemoteError;
use crate::pathmap::leaf_name;

pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    File {
        size: u64,
        last_modified: DateTime<Utc>,
        etag: Option<String>,
    },
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItemInfo {
    pub name: String,
    pub full_path: String,
    pub kind: ItemKind,
}

impl BlobItemInfo {
    pub fn file(
        full_path: impl Into<String>,
        size: u64,
        last_modified: DateTime<Utc>,
        etag: Option<String>,
    ) -> Self {
        let full_path = full_path.into();
        Self {
            name: leaf_name(&full_path).to_owned(),
            full_path,
            kind: ItemKind::File {
                size,
                last_modified,
                etag,
            },
        }
    }

    pub fn directory(full_path: impl Into<String>) -> Self {
        let full_path = full_path.into();
        Self {
            name: leaf_name(&full_path).to_owned(),
            full_path,
            kind: ItemKind::Directory,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, ItemKind::Directory)
    }

    pub fn size(&self) -> u64 {
        match self.kind {
            ItemKind::File { size, .. } => size,
            ItemKind::Directory => 0,
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            ItemKind::File { last_modified, .. } => Some(last_modified),
            ItemKind::Directory => None,
        }
    }

    pub fn etag(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File { etag, .. } => etag.as_deref(),
            ItemKind::Directory => None,
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn probe(&self) -> Result<(), RemoteError>;

    async fn list_by_hierarchy(&self, prefix: &str) -> Result<Vec<BlobItemInfo>, RemoteError>;

    async fn list_all(&self, prefix: &str) -> Result<Vec<String>, RemoteError>;

    async fn get_properties(&self, key: &str) -> Result<Option<BlobItemInfo>, RemoteError>;

    async fn download(&self, key: &str) -> Result<ByteStream, RemoteError>;

    async fn upload(
        &self,
        key: &str,
        content: ByteStream,
        overwrite: bool,
    ) -> Result<(), RemoteError>;

    async fn copy(&self, src: &str, dst: &str) -> Result<(), RemoteError>;

    async fn delete(&self, key: &str) -> Result<(), RemoteError>;

    async fn exists(&self, key: &str) -> Result<bool, RemoteError>;
}
