use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;

use crate::error::RemoteError;
use crate::store::{BlobItemInfo, BlobStore, ByteStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Probe,
    ListHierarchy(String),
    ListAll(String),
    GetProperties(String),
    Download(String),
    Upload(String),
    Copy(String, String),
    Delete(String),
    Exists(String),
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, StoredBlob>>,
    journal: Mutex<Vec<StoreOp>>,
    etag_seq: Mutex<u64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeds a blob directly, bypassing the journal.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let etag = self.next_etag();
        self.blobs.lock().insert(
            key.into(),
            StoredBlob {
                data: data.into(),
                last_modified: Utc::now(),
                etag,
            },
        );
    }

    pub fn contents(&self, key: &str) -> Option<Bytes> {
        self.blobs.lock().get(key).map(|blob| blob.data.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    pub fn take_ops(&self) -> Vec<StoreOp> {
        std::mem::take(&mut self.journal.lock())
    }

    fn record(&self, op: StoreOp) {
        self.journal.lock().push(op);
    }

    fn next_etag(&self) -> String {
        let mut seq = self.etag_seq.lock();
        *seq += 1;
        format!("0x{:016x}", *seq)
    }

    fn item_for(key: &str, blob: &StoredBlob) -> BlobItemInfo {
        BlobItemInfo::file(
            key,
            blob.data.len() as u64,
            blob.last_modified,
            Some(blob.etag.clone()),
        )
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn probe(&self) -> Result<(), RemoteError> {
        self.record(StoreOp::Probe);
        Ok(())
    }

    async fn list_by_hierarchy(&self, prefix: &str) -> Result<Vec<BlobItemInfo>, RemoteError> {
        self.record(StoreOp::ListHierarchy(prefix.to_owned()));
        let blobs = self.blobs.lock();

        let mut entries = Vec::new();
        let mut last_dir: Option<String> = None;
        for (key, blob) in blobs.range(prefix.to_owned()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find('/') {
                Some(idx) => {
                    let dir_path = &key[..prefix.len() + idx];
                    if last_dir.as_deref() != Some(dir_path) {
                        entries.push(BlobItemInfo::directory(dir_path));
                        last_dir = Some(dir_path.to_owned());
                    }
                }
                None => entries.push(Self::item_for(key, blob)),
            }
        }
        Ok(entries)
    }

    async fn list_all(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        self.record(StoreOp::ListAll(prefix.to_owned()));
        let blobs = self.blobs.lock();
        Ok(blobs
            .range(prefix.to_owned()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn get_properties(&self, key: &str) -> Result<Option<BlobItemInfo>, RemoteError> {
        self.record(StoreOp::GetProperties(key.to_owned()));
        Ok(self
            .blobs
            .lock()
            .get(key)
            .map(|blob| Self::item_for(key, blob)))
    }

    async fn download(&self, key: &str) -> Result<ByteStream, RemoteError> {
        self.record(StoreOp::Download(key.to_owned()));
        let data = self
            .blobs
            .lock()
            .get(key)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| RemoteError::not_found(key))?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn upload(
        &self,
        key: &str,
        mut content: ByteStream,
        overwrite: bool,
    ) -> Result<(), RemoteError> {
        self.record(StoreOp::Upload(key.to_owned()));
        if !overwrite && self.blobs.lock().contains_key(key) {
            return Err(RemoteError::conflict(key));
        }

        let mut data = Vec::new();
        content
            .read_to_end(&mut data)
            .await
            .map_err(|err| RemoteError::new(500, format!("upload stream failed: {err}")))?;

        let etag = self.next_etag();
        self.blobs.lock().insert(
            key.to_owned(),
            StoredBlob {
                data: Bytes::from(data),
                last_modified: Utc::now(),
                etag,
            },
        );
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), RemoteError> {
        self.record(StoreOp::Copy(src.to_owned(), dst.to_owned()));
        let source = self
            .blobs
            .lock()
            .get(src)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(src))?;

        let etag = self.next_etag();
        self.blobs.lock().insert(
            dst.to_owned(),
            StoredBlob {
                data: source.data,
                last_modified: Utc::now(),
                etag,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteError> {
        self.record(StoreOp::Delete(key.to_owned()));
        self.blobs.lock().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        self.record(StoreOp::Exists(key.to_owned()));
        Ok(self.blobs.lock().contains_key(key))
    }
}
