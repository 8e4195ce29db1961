use std::future::Future;
use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

use crate::cache::MetadataCache;
use crate::config::MountConfig;
use crate::content::FileContext;
use crate::error::{FsResult, FsStatus, RemoteError};
use crate::pathmap::{PathMapper, is_root_path, leaf_name, parent_prefix};
use crate::store::{BlobItemInfo, BlobStore};
use crate::util::wildcard_match;

// The store is effectively unbounded; report a fixed 1 TiB volume.
const SYNTHETIC_VOLUME_BYTES: u64 = 1 << 40;

const MAX_COMPONENT_LENGTH: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Open,
    CreateNew,
    Create,
    OpenOrCreate,
    Truncate,
    Append,
}

impl OpenMode {
    fn creates_missing(self) -> bool {
        matches!(
            self,
            OpenMode::CreateNew | OpenMode::Create | OpenMode::OpenOrCreate | OpenMode::Append
        )
    }

    fn truncates_existing(self) -> bool {
        matches!(self, OpenMode::Create | OpenMode::Truncate)
    }
}

#[derive(Debug, Default)]
pub struct Handle {
    context: Option<FileContext>,
}

impl Handle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> Option<&FileContext> {
        self.context.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub is_directory: bool,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub label: String,
    pub filesystem_name: String,
    pub max_component_length: u32,
    pub case_sensitive_search: bool,
    pub case_preserved_names: bool,
    pub unicode_on_disk: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskSpace {
    pub total: u64,
    pub free: u64,
    pub available: u64,
}

pub struct BlobFs {
    config: MountConfig,
    mapper: PathMapper,
    cache: MetadataCache,
    store: Arc<dyn BlobStore>,
    runtime: Runtime,
    spill_dir: TempDir,
}

impl BlobFs {
    pub fn new(config: MountConfig, store: Arc<dyn BlobStore>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("blobfs-io")
            .enable_all()
            .build()?;
        let spill_dir = tempfile::Builder::new().prefix("blobfs-spill-").tempdir()?;
        let mapper = PathMapper::new(config.subfolder.as_deref());
        let cache = MetadataCache::new(config.cache_ttl);
        Ok(Self {
            config,
            mapper,
            cache,
            store,
            runtime,
            spill_dir,
        })
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    // Callbacks are synchronous; remote futures run to completion on the
    // caller thread.
    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    fn lookup_item(&self, key: &str) -> FsResult<Option<BlobItemInfo>> {
        if let Some(info) = self.cache.get_item(key) {
            return Ok(Some(info));
        }
        let fetched = self
            .block_on(self.store.get_properties(key))
            .map_err(FsStatus::from)?;
        if let Some(info) = &fetched {
            self.cache.set_item(key, info.clone());
        }
        Ok(fetched)
    }

    fn listing(&self, prefix: &str) -> FsResult<Arc<Vec<BlobItemInfo>>> {
        if let Some(listing) = self.cache.get_listing(prefix) {
            return Ok(listing);
        }
        let items = self
            .block_on(self.store.list_by_hierarchy(prefix))
            .map_err(FsStatus::from)?;
        for item in &items {
            self.cache.set_item(item.full_path.clone(), item.clone());
        }
        Ok(self.cache.set_listing(prefix, items))
    }

    // A top-level key has the empty parent prefix, which drops the whole
    // cache; broad, but keeps ancestor listings coherent.
    fn invalidate_key(&self, key: &str) {
        self.cache.invalidate_item(key);
        self.cache.invalidate_prefix(parent_prefix(key));
    }

    fn invalidate_tree(&self, prefix: &str) {
        self.cache.invalidate_prefix(prefix);
        self.cache.invalidate_prefix(parent_prefix(prefix));
    }

    fn ensure_loaded(&self, ctx: &FileContext) -> FsResult<()> {
        if ctx.is_loaded() {
            return Ok(());
        }
        let key = ctx.blob_path();
        let size = self.lookup_item(key)?.map(|info| info.size()).unwrap_or(0);
        let stream = self
            .block_on(self.store.download(key))
            .map_err(FsStatus::from)?;
        let copied = self.block_on(ctx.load(
            stream,
            size,
            self.spill_dir.path(),
            self.config.spill_threshold,
        ))?;
        debug!("loaded {} bytes for {}", copied, key);
        Ok(())
    }

    // Write path: a blob absent from the store is a file being written for
    // the first time, not an error.
    fn ensure_content(&self, ctx: &FileContext) -> FsResult<()> {
        if ctx.is_loaded() {
            return Ok(());
        }
        let exists = self
            .block_on(self.store.exists(ctx.blob_path()))
            .map_err(FsStatus::from)?;
        if exists {
            self.ensure_loaded(ctx)
        } else {
            ctx.initialize_empty();
            Ok(())
        }
    }

    fn directory_info(&self, name: &str) -> FileInfo {
        FileInfo {
            name: name.to_owned(),
            size: 0,
            last_modified: Utc::now(),
            is_directory: true,
            read_only: self.config.read_only,
        }
    }

    fn file_info(&self, info: &BlobItemInfo) -> FileInfo {
        FileInfo {
            name: info.name.clone(),
            size: info.size(),
            last_modified: info.last_modified().unwrap_or_else(Utc::now),
            is_directory: info.is_directory(),
            read_only: self.config.read_only,
        }
    }

    pub fn open(
        &self,
        handle: &mut Handle,
        native_path: &str,
        mode: OpenMode,
        directory_hint: bool,
    ) -> FsResult<()> {
        debug!(
            "open {:?} mode={:?} dir_hint={}",
            native_path, mode, directory_hint
        );

        if is_root_path(native_path) {
            handle.context = Some(FileContext::root());
            return Ok(());
        }
        let key = self.mapper.to_blob_path(native_path);

        if directory_hint {
            if mode == OpenMode::CreateNew && self.config.read_only {
                return Err(FsStatus::AccessDenied);
            }
            // Directories are synthetic; creation needs no remote write.
            handle.context = Some(FileContext::directory(key));
            return Ok(());
        }

        let info = self.lookup_item(&key)?;
        if let Some(info) = &info
            && info.is_directory()
        {
            handle.context = Some(FileContext::directory(key));
            return Ok(());
        }
        if info.is_none() {
            let probe = self.listing(&format!("{key}/"))?;
            if !probe.is_empty() {
                handle.context = Some(FileContext::directory(key));
                return Ok(());
            }
        }

        let exists = info.is_some();
        let read_only = self.config.read_only;
        match mode {
            OpenMode::Open if !exists => return Err(FsStatus::FileNotFound),
            OpenMode::CreateNew if read_only => return Err(FsStatus::AccessDenied),
            OpenMode::CreateNew if exists => return Err(FsStatus::FileExists),
            OpenMode::Create if read_only => return Err(FsStatus::AccessDenied),
            OpenMode::OpenOrCreate if read_only && !exists => {
                return Err(FsStatus::AccessDenied);
            }
            OpenMode::Truncate if !exists => return Err(FsStatus::FileNotFound),
            OpenMode::Truncate if read_only => return Err(FsStatus::AccessDenied),
            OpenMode::Append if read_only => return Err(FsStatus::AccessDenied),
            _ => {}
        }

        let ctx = FileContext::file(key);
        if (!exists && mode.creates_missing()) || (exists && mode.truncates_existing()) {
            ctx.initialize_empty();
            ctx.mark_dirty();
        }
        handle.context = Some(ctx);
        Ok(())
    }

    pub fn read(&self, handle: &Handle, dst: &mut [u8], offset: u64) -> FsResult<usize> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if ctx.is_directory() {
            return Err(FsStatus::AccessDenied);
        }
        self.ensure_loaded(ctx)?;
        Ok(ctx.read(dst, offset)?)
    }

    pub fn write(&self, handle: &Handle, src: &[u8], offset: u64, append: bool) -> FsResult<usize> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if self.config.read_only || ctx.is_directory() {
            return Err(FsStatus::AccessDenied);
        }
        self.ensure_content(ctx)?;
        let offset = if append { ctx.len() } else { offset };
        Ok(ctx.write(src, offset)?)
    }

    pub fn truncate(&self, handle: &Handle, length: u64) -> FsResult<()> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if self.config.read_only || ctx.is_directory() {
            return Err(FsStatus::AccessDenied);
        }
        self.ensure_content(ctx)?;
        ctx.set_length(length)?;
        Ok(())
    }

    pub fn allocation_hint(&self, handle: &Handle, size: u64) -> FsResult<()> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if ctx.is_directory() {
            return Ok(());
        }
        if size > ctx.len() {
            ctx.reserve(size)?;
        }
        Ok(())
    }

    // Content reaches the store at cleanup; nothing incremental to push.
    pub fn flush(&self, _handle: &Handle) -> FsResult<()> {
        Ok(())
    }

    // Validate and record intent only; the OS may still cancel the delete
    // before cleanup performs it.
    pub fn delete_file(&self, handle: &Handle) -> FsResult<()> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if self.config.read_only {
            return Err(FsStatus::AccessDenied);
        }
        if ctx.is_directory() {
            return Err(FsStatus::AccessDenied);
        }
        if !ctx.is_loaded() {
            let exists = self
                .block_on(self.store.exists(ctx.blob_path()))
                .map_err(FsStatus::from)?;
            if !exists {
                return Err(FsStatus::FileNotFound);
            }
        }
        ctx.set_delete_pending(true);
        Ok(())
    }

    pub fn delete_directory(&self, handle: &Handle) -> FsResult<()> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if self.config.read_only {
            return Err(FsStatus::AccessDenied);
        }
        if !ctx.is_directory() || ctx.is_root() {
            return Err(FsStatus::AccessDenied);
        }
        ctx.set_delete_pending(true);
        Ok(())
    }

    // Copy-then-delete; a failure after the copy leaves the destination in
    // place.
    pub fn rename(
        &self,
        handle: &Handle,
        old_path: &str,
        new_path: &str,
        replace: bool,
    ) -> FsResult<()> {
        let ctx = handle.context().ok_or(FsStatus::InvalidHandle)?;
        if self.config.read_only {
            return Err(FsStatus::AccessDenied);
        }
        let old_key = self.mapper.to_blob_path(old_path);
        let new_key = self.mapper.to_blob_path(new_path);
        debug!("rename {} -> {} (replace={})", old_key, new_key, replace);

        if ctx.is_directory() {
            let old_prefix = format!("{old_key}/");
            let new_prefix = format!("{new_key}/");
            let keys = self
                .block_on(self.store.list_all(&old_prefix))
                .map_err(FsStatus::from)?;
            self.block_on(async {
                for key in &keys {
                    let dst = format!("{new_prefix}{}", &key[old_prefix.len()..]);
                    self.store.copy(key, &dst).await?;
                    self.store.delete(key).await?;
                }
                Ok::<_, RemoteError>(())
            })
            .map_err(FsStatus::from)?;
            self.invalidate_tree(&old_prefix);
            self.invalidate_tree(&new_prefix);
        } else {
            if !replace {
                let taken = self
                    .block_on(self.store.exists(&new_key))
                    .map_err(FsStatus::from)?;
                if taken {
                    return Err(FsStatus::FileExists);
                }
            }
            self.block_on(async {
                self.store.copy(&old_key, &new_key).await?;
                self.store.delete(&old_key).await
            })
            .map_err(FsStatus::from)?;
            self.invalidate_key(&old_key);
            self.invalidate_key(&new_key);
        }
        Ok(())
    }

    // Failures here have no return channel; a modified file closed while
    // the remote is unreachable loses its edits.
    pub fn cleanup(&self, handle: &Handle) {
        let Some(ctx) = handle.context() else {
            return;
        };

        if ctx.delete_pending() && ctx.is_directory() {
            if ctx.is_root() {
                return;
            }
            let prefix = format!("{}/", ctx.blob_path());
            debug!("recursive delete under {}", prefix);
            let result = self.block_on(async {
                let keys = self.store.list_all(&prefix).await?;
                for key in &keys {
                    self.store.delete(key).await?;
                }
                Ok::<_, RemoteError>(())
            });
            if let Err(err) = result {
                error!("recursive delete under {} failed during cleanup: {}", prefix, err);
            }
            self.invalidate_tree(&prefix);
        } else if ctx.delete_pending() {
            let key = ctx.blob_path();
            debug!("deleting {} on cleanup", key);
            if let Err(err) = self.block_on(self.store.delete(key)) {
                error!("delete of {} failed during cleanup: {}", key, err);
            }
            self.invalidate_key(key);
        } else if ctx.is_dirty() && !self.config.read_only && !ctx.blob_path().is_empty() {
            let key = ctx.blob_path();
            debug!("uploading {} ({} bytes) on cleanup", key, ctx.len());
            match ctx.read_stream() {
                Ok(stream) => {
                    if let Err(err) = self.block_on(self.store.upload(key, stream, true)) {
                        error!("upload of {} failed during cleanup, edits lost: {}", key, err);
                    }
                }
                Err(err) => {
                    error!("buffer for {} unreadable during cleanup, edits lost: {}", key, err);
                }
            }
            self.invalidate_key(key);
        }
    }

    pub fn close(&self, handle: &mut Handle) {
        if let Some(ctx) = handle.context.take() {
            ctx.dispose();
        }
    }

    pub fn enumerate(&self, native_path: &str) -> FsResult<Arc<Vec<BlobItemInfo>>> {
        let prefix = self.mapper.list_prefix(native_path);
        self.listing(&prefix)
    }

    pub fn enumerate_pattern(
        &self,
        native_path: &str,
        pattern: &str,
    ) -> FsResult<Vec<BlobItemInfo>> {
        let entries = self.enumerate(native_path)?;
        Ok(entries
            .iter()
            .filter(|entry| wildcard_match(pattern, &entry.name))
            .cloned()
            .collect())
    }

    pub fn get_info(&self, handle: &Handle, native_path: &str) -> FsResult<FileInfo> {
        if is_root_path(native_path) {
            return Ok(self.directory_info(""));
        }

        if let Some(ctx) = handle.context() {
            if ctx.is_directory() {
                return Ok(self.directory_info(leaf_name(ctx.blob_path())));
            }
            if ctx.is_loaded() {
                // The open buffer is authoritative over the remote size.
                let cached = self.cache.get_item(ctx.blob_path());
                return Ok(FileInfo {
                    name: leaf_name(ctx.blob_path()).to_owned(),
                    size: ctx.len(),
                    last_modified: cached
                        .and_then(|info| info.last_modified())
                        .unwrap_or_else(Utc::now),
                    is_directory: false,
                    read_only: self.config.read_only,
                });
            }
        }

        let key = self.mapper.to_blob_path(native_path);
        if let Some(info) = self.lookup_item(&key)? {
            return Ok(self.file_info(&info));
        }
        let probe = self.listing(&format!("{key}/"))?;
        if !probe.is_empty() {
            return Ok(self.directory_info(leaf_name(&key)));
        }
        Err(FsStatus::FileNotFound)
    }

    // The store has no attribute surface; accepted and ignored.
    pub fn set_attributes(&self, _handle: &Handle, _attributes: u32) -> FsResult<()> {
        Ok(())
    }

    pub fn set_times(
        &self,
        _handle: &Handle,
        _creation: Option<DateTime<Utc>>,
        _access: Option<DateTime<Utc>>,
        _write: Option<DateTime<Utc>>,
    ) -> FsResult<()> {
        Ok(())
    }

    pub fn lock_file(&self, _handle: &Handle, _offset: u64, _length: u64) -> FsResult<()> {
        Err(FsStatus::NotImplemented)
    }

    pub fn unlock_file(&self, _handle: &Handle, _offset: u64, _length: u64) -> FsResult<()> {
        Err(FsStatus::NotImplemented)
    }

    pub fn get_security(&self, _handle: &Handle) -> FsResult<Vec<u8>> {
        Err(FsStatus::NotImplemented)
    }

    pub fn set_security(&self, _handle: &Handle, _descriptor: &[u8]) -> FsResult<()> {
        Err(FsStatus::NotImplemented)
    }

    pub fn find_streams(&self, _handle: &Handle) -> FsResult<Vec<BlobItemInfo>> {
        Err(FsStatus::NotImplemented)
    }

    pub fn volume_info(&self) -> VolumeInfo {
        VolumeInfo {
            label: format!("Azure:{}", self.config.container),
            filesystem_name: "BlobFS".to_owned(),
            max_component_length: MAX_COMPONENT_LENGTH,
            case_sensitive_search: true,
            case_preserved_names: true,
            unicode_on_disk: true,
        }
    }

    pub fn disk_space(&self) -> DiskSpace {
        DiskSpace {
            total: SYNTHETIC_VOLUME_BYTES,
            free: SYNTHETIC_VOLUME_BYTES,
            available: SYNTHETIC_VOLUME_BYTES,
        }
    }

    pub fn mounted(&self) -> FsResult<()> {
        self.block_on(self.store.probe()).map_err(FsStatus::from)?;
        info!(
            "mounted container {} at {}",
            self.config.container, self.config.mount_point
        );
        Ok(())
    }

    pub fn unmounted(&self) {
        self.cache.clear();
        info!("unmounted container {}", self.config.container);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memstore::{MemoryBlobStore, StoreOp};
    use bytes::Bytes;

    fn config() -> MountConfig {
        MountConfig::new("acct", "key", "docs", "B:")
    }

    fn mount(config: MountConfig) -> (BlobFs, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        let fs = BlobFs::new(config, store.clone()).unwrap();
        (fs, store)
    }

    fn open(fs: &BlobFs, path: &str, mode: OpenMode) -> FsResult<Handle> {
        let mut handle = Handle::new();
        fs.open(&mut handle, path, mode, false)?;
        Ok(handle)
    }

    #[test]
    fn create_new_under_subfolder_uploads_on_cleanup() {
        let (fs, store) = mount(config().with_subfolder("data"));
        store.take_ops();

        let mut handle = open(&fs, "\\folder\\new.txt", OpenMode::CreateNew).unwrap();
        fs.write(&handle, &[0x41, 0x42, 0x43], 0, false).unwrap();
        fs.cleanup(&handle);
        fs.close(&mut handle);

        assert_eq!(
            store.contents("data/folder/new.txt").unwrap(),
            Bytes::from_static(b"ABC")
        );
        assert_eq!(
            store.take_ops(),
            vec![
                StoreOp::GetProperties("data/folder/new.txt".into()),
                StoreOp::ListHierarchy("data/folder/new.txt/".into()),
                StoreOp::Upload("data/folder/new.txt".into()),
            ]
        );

        // Both the item and the parent listing were invalidated: the next
        // enumeration goes back to the store and sees the new blob.
        let entries = fs.enumerate("\\folder").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].full_path, "data/folder/new.txt");
    }

    #[test]
    fn read_existing_blob_without_upload() {
        let (fs, store) = mount(config());
        store.insert("x.txt", &b"hello"[..]);

        let mut handle = open(&fs, "\\x.txt", OpenMode::Open).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(fs.read(&handle, &mut buf, 0).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        fs.cleanup(&handle);
        fs.close(&mut handle);

        let ops = store.take_ops();
        assert!(!ops.iter().any(|op| matches!(op, StoreOp::Upload(_))));
    }

    #[test]
    fn non_replacing_rename_onto_existing_is_rejected() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"a"[..]);
        store.insert("b.txt", &b"b"[..]);

        let handle = open(&fs, "\\a.txt", OpenMode::Open).unwrap();
        fs.enumerate("\\").unwrap();
        store.take_ops();

        let err = fs.rename(&handle, "\\a.txt", "\\b.txt", false).unwrap_err();
        assert_eq!(err, FsStatus::FileExists);

        // Only the existence probe ran: no copy, no delete, and the cached
        // root listing survived.
        assert_eq!(store.take_ops(), vec![StoreOp::Exists("b.txt".into())]);
        fs.enumerate("\\").unwrap();
        assert!(store.take_ops().is_empty());
        assert_eq!(store.contents("a.txt").unwrap(), Bytes::from_static(b"a"));
        assert_eq!(store.contents("b.txt").unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn replacing_rename_moves_content() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"payload"[..]);
        store.insert("b.txt", &b"old"[..]);

        let handle = open(&fs, "\\a.txt", OpenMode::Open).unwrap();
        fs.rename(&handle, "\\a.txt", "\\b.txt", true).unwrap();

        assert!(store.contents("a.txt").is_none());
        assert_eq!(store.contents("b.txt").unwrap(), Bytes::from_static(b"payload"));
    }

    #[test]
    fn directory_rename_moves_every_key() {
        let (fs, store) = mount(config());
        store.insert("photos/a.jpg", &b"a"[..]);
        store.insert("photos/b/c.jpg", &b"c"[..]);

        let handle = open(&fs, "\\photos", OpenMode::Open).unwrap();
        assert!(handle.context().unwrap().is_directory());
        fs.rename(&handle, "\\photos", "\\archive", false).unwrap();

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["archive/a.jpg", "archive/b/c.jpg"]);
    }

    #[test]
    fn recursive_directory_delete_on_cleanup() {
        let (fs, store) = mount(config());
        store.insert("photos/a.jpg", &b"a"[..]);
        store.insert("photos/b/c.jpg", &b"c"[..]);

        let mut handle = open(&fs, "\\photos", OpenMode::Open).unwrap();
        fs.delete_directory(&handle).unwrap();
        store.take_ops();
        fs.cleanup(&handle);
        fs.close(&mut handle);

        assert!(store.keys().is_empty());
        assert_eq!(
            store.take_ops(),
            vec![
                StoreOp::ListAll("photos/".into()),
                StoreOp::Delete("photos/a.jpg".into()),
                StoreOp::Delete("photos/b/c.jpg".into()),
            ]
        );
    }

    #[test]
    fn large_blob_spills_to_disk() {
        let mut cfg = config();
        cfg.spill_threshold = 64 * 1024;
        let (fs, store) = mount(cfg);
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        store.insert("big.bin", payload.clone());

        let handle = open(&fs, "\\big.bin", OpenMode::Open).unwrap();
        let mut buf = [0u8; 64];
        let offset = 150_000u64;
        assert_eq!(fs.read(&handle, &mut buf, offset).unwrap(), 64);
        assert_eq!(&buf[..], &payload[offset as usize..offset as usize + 64]);
        assert!(handle.context().unwrap().is_spilled());
    }

    #[test]
    fn read_only_mount_rejects_mutation() {
        let (fs, store) = mount(config().read_only(true));
        store.insert("a.txt", &b"hello"[..]);

        let handle = open(&fs, "\\a.txt", OpenMode::Open).unwrap();
        assert_eq!(
            fs.write(&handle, b"x", 0, false).unwrap_err(),
            FsStatus::AccessDenied
        );
        assert_eq!(fs.truncate(&handle, 0).unwrap_err(), FsStatus::AccessDenied);
        assert_eq!(fs.delete_file(&handle).unwrap_err(), FsStatus::AccessDenied);

        assert_eq!(
            open(&fs, "\\new.txt", OpenMode::CreateNew).unwrap_err(),
            FsStatus::AccessDenied
        );
        assert_eq!(
            open(&fs, "\\new.txt", OpenMode::OpenOrCreate).unwrap_err(),
            FsStatus::AccessDenied
        );
    }

    #[test]
    fn open_mode_dispositions() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"hello"[..]);

        assert_eq!(
            open(&fs, "\\missing.txt", OpenMode::Open).unwrap_err(),
            FsStatus::FileNotFound
        );
        assert_eq!(
            open(&fs, "\\a.txt", OpenMode::CreateNew).unwrap_err(),
            FsStatus::FileExists
        );
        assert_eq!(
            open(&fs, "\\missing.txt", OpenMode::Truncate).unwrap_err(),
            FsStatus::FileNotFound
        );

        // Create-or-truncate on an existing blob starts from empty, dirty.
        let handle = open(&fs, "\\a.txt", OpenMode::Create).unwrap();
        let ctx = handle.context().unwrap();
        assert!(ctx.is_dirty());
        assert_eq!(ctx.len(), 0);
    }

    #[test]
    fn append_writes_land_at_end_of_file() {
        let (fs, store) = mount(config());
        store.insert("log.txt", &b"hello"[..]);

        let mut handle = open(&fs, "\\log.txt", OpenMode::Append).unwrap();
        fs.write(&handle, b" world", 0, true).unwrap();
        fs.cleanup(&handle);
        fs.close(&mut handle);

        assert_eq!(
            store.contents("log.txt").unwrap(),
            Bytes::from_static(b"hello world")
        );
    }

    #[test]
    fn allocation_hint_is_invisible_to_readers_and_upload() {
        let (fs, store) = mount(config());

        let mut handle = open(&fs, "\\a.bin", OpenMode::CreateNew).unwrap();
        fs.write(&handle, b"abc", 0, false).unwrap();
        fs.allocation_hint(&handle, 4096).unwrap();

        let info = fs.get_info(&handle, "\\a.bin").unwrap();
        assert_eq!(info.size, 3);

        fs.cleanup(&handle);
        fs.close(&mut handle);
        assert_eq!(store.contents("a.bin").unwrap(), Bytes::from_static(b"abc"));
    }

    #[test]
    fn allocation_hint_alone_uploads_nothing_new() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"hello"[..]);

        let mut handle = open(&fs, "\\a.txt", OpenMode::Open).unwrap();
        let mut buf = [0u8; 5];
        fs.read(&handle, &mut buf, 0).unwrap();
        fs.allocation_hint(&handle, 4096).unwrap();
        store.take_ops();
        fs.cleanup(&handle);
        fs.close(&mut handle);

        assert!(store.take_ops().is_empty());
        assert_eq!(store.contents("a.txt").unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn enumerate_caches_listing_and_items() {
        let (fs, store) = mount(config());
        store.insert("docs/a.txt", &b"a"[..]);
        store.insert("docs/sub/b.txt", &b"b"[..]);

        let entries = fs.enumerate("\\docs").unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
        assert!(entries[1].is_directory());
        store.take_ops();

        // Second enumeration and a child open are served from cache.
        fs.enumerate("\\docs").unwrap();
        open(&fs, "\\docs\\a.txt", OpenMode::Open).unwrap();
        assert!(store.take_ops().is_empty());
    }

    #[test]
    fn enumerate_pattern_filters_children() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"a"[..]);
        store.insert("b.md", &b"b"[..]);
        store.insert("c.txt", &b"c"[..]);

        let matched = fs.enumerate_pattern("\\", "*.txt").unwrap();
        let names: Vec<&str> = matched.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "c.txt"]);
    }

    #[test]
    fn get_info_detects_directories_and_missing_paths() {
        let (fs, store) = mount(config());
        store.insert("photos/a.jpg", &b"a"[..]);

        let root = fs.get_info(&Handle::new(), "\\").unwrap();
        assert!(root.is_directory);

        let dir = fs.get_info(&Handle::new(), "\\photos").unwrap();
        assert!(dir.is_directory);
        assert_eq!(dir.name, "photos");
        assert_eq!(dir.size, 0);

        let file = fs.get_info(&Handle::new(), "\\photos\\a.jpg").unwrap();
        assert!(!file.is_directory);
        assert_eq!(file.size, 1);

        assert_eq!(
            fs.get_info(&Handle::new(), "\\nope").unwrap_err(),
            FsStatus::FileNotFound
        );
    }

    #[test]
    fn get_info_prefers_live_buffer_over_remote_size() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"hello"[..]);

        let handle = open(&fs, "\\a.txt", OpenMode::Open).unwrap();
        let mut buf = [0u8; 5];
        fs.read(&handle, &mut buf, 0).unwrap();
        fs.write(&handle, b" world", 5, false).unwrap();

        let info = fs.get_info(&handle, "\\a.txt").unwrap();
        assert_eq!(info.size, 11);
    }

    #[test]
    fn deleted_file_is_removed_on_cleanup() {
        let (fs, store) = mount(config());
        store.insert("gone.txt", &b"x"[..]);

        let mut handle = open(&fs, "\\gone.txt", OpenMode::Open).unwrap();
        fs.delete_file(&handle).unwrap();
        fs.cleanup(&handle);
        fs.close(&mut handle);

        assert!(store.contents("gone.txt").is_none());
    }

    #[test]
    fn cancelled_delete_leaves_blob_alone() {
        let (fs, store) = mount(config());
        store.insert("keep.txt", &b"x"[..]);

        let mut handle = open(&fs, "\\keep.txt", OpenMode::Open).unwrap();
        fs.delete_file(&handle).unwrap();
        handle.context().unwrap().set_delete_pending(false);
        fs.cleanup(&handle);
        fs.close(&mut handle);

        assert_eq!(store.contents("keep.txt").unwrap(), Bytes::from_static(b"x"));
    }

    #[test]
    fn callbacks_without_context_report_invalid_handle() {
        let (fs, _store) = mount(config());
        let handle = Handle::new();
        let mut buf = [0u8; 1];
        assert_eq!(
            fs.read(&handle, &mut buf, 0).unwrap_err(),
            FsStatus::InvalidHandle
        );
        assert_eq!(
            fs.write(&handle, b"x", 0, false).unwrap_err(),
            FsStatus::InvalidHandle
        );
        assert_eq!(fs.truncate(&handle, 0).unwrap_err(), FsStatus::InvalidHandle);
    }

    #[test]
    fn stubs_report_not_implemented() {
        let (fs, _store) = mount(config());
        let handle = Handle::new();
        assert_eq!(
            fs.lock_file(&handle, 0, 1).unwrap_err(),
            FsStatus::NotImplemented
        );
        assert_eq!(fs.get_security(&handle).unwrap_err(), FsStatus::NotImplemented);
        assert_eq!(fs.find_streams(&handle).unwrap_err(), FsStatus::NotImplemented);
    }

    #[test]
    fn synthetic_volume_identity() {
        let (fs, _store) = mount(config());
        let volume = fs.volume_info();
        assert_eq!(volume.label, "Azure:docs");
        assert_eq!(volume.filesystem_name, "BlobFS");
        assert_eq!(volume.max_component_length, 256);
        assert!(volume.case_sensitive_search);

        let space = fs.disk_space();
        assert_eq!(space.total, 1 << 40);
        assert_eq!(space.free, space.total);
    }

    #[test]
    fn unmount_clears_cached_listings() {
        let (fs, store) = mount(config());
        store.insert("a.txt", &b"a"[..]);

        fs.enumerate("\\").unwrap();
        store.take_ops();
        fs.enumerate("\\").unwrap();
        assert!(store.take_ops().is_empty());

        fs.unmounted();
        fs.enumerate("\\").unwrap();
        assert_eq!(store.take_ops(), vec![StoreOp::ListHierarchy("".into())]);
    }

    #[test]
    fn mounted_probes_the_store() {
        let (fs, store) = mount(config());
        fs.mounted().unwrap();
        assert_eq!(store.take_ops(), vec![StoreOp::Probe]);
    }

    #[test]
    fn open_detects_directory_from_listing_probe() {
        let (fs, store) = mount(config());
        store.insert("photos/a.jpg", &b"a"[..]);

        let handle = open(&fs, "\\photos", OpenMode::Open).unwrap();
        let ctx = handle.context().unwrap();
        assert!(ctx.is_directory());
        assert_eq!(ctx.blob_path(), "photos");

        // Reads against a directory handle are refused.
        let mut buf = [0u8; 1];
        assert_eq!(
            fs.read(&handle, &mut buf, 0).unwrap_err(),
            FsStatus::AccessDenied
        );
    }

    #[test]
    fn directory_hint_create_is_a_synthetic_no_op() {
        let (fs, store) = mount(config());
        let mut handle = Handle::new();
        fs.open(&mut handle, "\\newdir", OpenMode::CreateNew, true)
            .unwrap();
        assert!(handle.context().unwrap().is_directory());
        assert!(store.take_ops().is_empty());
        assert!(store.keys().is_empty());

        let (ro_fs, _) = mount(config().read_only(true));
        let mut ro_handle = Handle::new();
        assert_eq!(
            ro_fs
                .open(&mut ro_handle, "\\newdir", OpenMode::CreateNew, true)
                .unwrap_err(),
            FsStatus::AccessDenied
        );
    }
}
