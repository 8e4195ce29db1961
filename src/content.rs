use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;

use crate::store::ByteStream;

const COPY_CHUNK: usize = 64 * 1024;

enum ContentBuffer {
    Memory(Vec<u8>),
    // Anonymous temp file; already unlinked, so it vanishes even on
    // abnormal termination.
    Spilled(File),
}

struct ContentState {
    buffer: Option<ContentBuffer>,
    // Logical end-of-file. The underlying buffer never falls below this;
    // reserve may push the buffer past it.
    length: u64,
    dirty: bool,
}

pub struct FileContext {
    blob_path: String,
    is_directory: bool,
    delete_pending: AtomicBool,
    state: Mutex<ContentState>,
}

impl FileContext {
    pub fn file(blob_path: impl Into<String>) -> Self {
        Self::new(blob_path.into(), false)
    }

    pub fn directory(blob_path: impl Into<String>) -> Self {
        Self::new(blob_path.into(), true)
    }

    pub fn root() -> Self {
        Self::new(String::new(), true)
    }

    fn new(blob_path: String, is_directory: bool) -> Self {
        Self {
            blob_path,
            is_directory,
            delete_pending: AtomicBool::new(false),
            state: Mutex::new(ContentState {
                buffer: None,
                length: 0,
                dirty: false,
            }),
        }
    }

    pub fn blob_path(&self) -> &str {
        &self.blob_path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn is_root(&self) -> bool {
        self.is_directory && self.blob_path.is_empty()
    }

    pub fn delete_pending(&self) -> bool {
        self.delete_pending.load(Ordering::Acquire)
    }

    pub fn set_delete_pending(&self, pending: bool) {
        self.delete_pending.store(pending, Ordering::Release);
    }

    pub fn len(&self) -> u64 {
        self.state.lock().length
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().buffer.is_some()
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.state.lock().buffer, Some(ContentBuffer::Spilled(_)))
    }

    pub fn initialize_empty(&self) {
        let mut state = self.state.lock();
        state.buffer = Some(ContentBuffer::Memory(Vec::new()));
        state.length = 0;
    }

    pub fn mark_dirty(&self) {
        self.state.lock().dirty = true;
    }

    // The buffer is assembled outside the content lock and installed under it.
    pub async fn load(
        &self,
        mut stream: ByteStream,
        size: u64,
        spill_dir: &Path,
        threshold: u64,
    ) -> io::Result<u64> {
        let mut buffer = if size <= threshold {
            ContentBuffer::Memory(Vec::with_capacity(size as usize))
        } else {
            ContentBuffer::Spilled(tempfile::tempfile_in(spill_dir)?)
        };

        let mut chunk = vec![0u8; COPY_CHUNK];
        let mut copied = 0u64;
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            match &mut buffer {
                ContentBuffer::Memory(vec) => vec.extend_from_slice(&chunk[..n]),
                ContentBuffer::Spilled(file) => file.write_all(&chunk[..n])?,
            }
            copied += n as u64;
        }

        let mut state = self.state.lock();
        state.buffer = Some(buffer);
        state.length = copied;
        state.dirty = false;
        Ok(copied)
    }

    pub fn read(&self, dst: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut state = self.state.lock();
        let length = state.length;
        let buffer = state.buffer.as_mut().ok_or_else(not_loaded)?;

        if offset >= length {
            return Ok(0);
        }
        let avail = (length - offset).min(dst.len() as u64) as usize;

        match buffer {
            ContentBuffer::Memory(vec) => {
                let start = offset as usize;
                dst[..avail].copy_from_slice(&vec[start..start + avail]);
            }
            ContentBuffer::Spilled(file) => {
                file.seek(SeekFrom::Start(offset))?;
                let mut filled = 0;
                while filled < avail {
                    let n = file.read(&mut dst[filled..avail])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                // A sparse region inside the logical range reads as zero.
                dst[filled..avail].fill(0);
            }
        }
        Ok(avail)
    }

    pub fn write(&self, src: &[u8], offset: u64) -> io::Result<usize> {
        let mut state = self.state.lock();
        let buffer = state.buffer.as_mut().ok_or_else(not_loaded)?;
        let end = offset + src.len() as u64;

        match buffer {
            ContentBuffer::Memory(vec) => {
                if (vec.len() as u64) < end {
                    vec.resize(end as usize, 0);
                }
                vec[offset as usize..end as usize].copy_from_slice(src);
            }
            ContentBuffer::Spilled(file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(src)?;
            }
        }

        state.length = state.length.max(end);
        state.dirty = true;
        Ok(src.len())
    }

    pub fn set_length(&self, n: u64) -> io::Result<()> {
        let mut state = self.state.lock();
        let buffer = state.buffer.as_mut().ok_or_else(not_loaded)?;

        match buffer {
            ContentBuffer::Memory(vec) => vec.resize(n as usize, 0),
            ContentBuffer::Spilled(file) => file.set_len(n)?,
        }
        state.length = n;
        state.dirty = true;
        Ok(())
    }

    // Allocation hints grow the underlying buffer only; logical length and
    // dirtiness stay untouched.
    pub fn reserve(&self, n: u64) -> io::Result<()> {
        let mut state = self.state.lock();
        match state.buffer.as_mut() {
            Some(ContentBuffer::Memory(vec)) => {
                if (vec.len() as u64) < n {
                    vec.resize(n as usize, 0);
                }
            }
            Some(ContentBuffer::Spilled(file)) => {
                if file.metadata()?.len() < n {
                    file.set_len(n)?;
                }
            }
            // Nothing attached yet; a later load sizes the buffer itself.
            None => {}
        }
        Ok(())
    }

    pub fn read_stream(&self) -> io::Result<ByteStream> {
        let mut state = self.state.lock();
        let length = state.length;
        let buffer = state.buffer.as_mut().ok_or_else(not_loaded)?;

        let stream: ByteStream = match buffer {
            ContentBuffer::Memory(vec) => {
                let data = Bytes::copy_from_slice(&vec[..length as usize]);
                Box::pin(std::io::Cursor::new(data))
            }
            ContentBuffer::Spilled(file) => {
                let mut reader = file.try_clone()?;
                reader.seek(SeekFrom::Start(0))?;
                Box::pin(tokio::fs::File::from_std(reader).take(length))
            }
        };
        Ok(stream)
    }

    pub fn dispose(self) {
        drop(self);
    }
}

impl fmt::Debug for FileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FileContext")
            .field("blob_path", &self.blob_path)
            .field("is_directory", &self.is_directory)
            .field("delete_pending", &self.delete_pending())
            .field("loaded", &state.buffer.is_some())
            .field("length", &state.length)
            .field("dirty", &state.dirty)
            .finish()
    }
}

fn not_loaded() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "no content buffer attached")
}
