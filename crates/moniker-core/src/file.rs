//! File-backed stream.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MonikerError, MonikerResult};
use crate::stream::{read_len, InfoMask, SeekWhence, StorageKind, Stream, StreamInfo};

/// A [`Stream`] over a file on disk.
///
/// `commit` syncs the file to disk. Writes go straight to the file, so
/// `revert` is not supported.
#[derive(Debug)]
pub struct FileStream {
    file: File,
    path: PathBuf,
    content_type: Option<String>,
}

impl FileStream {
    /// Open an existing file for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> MonikerResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!(path = %path.display(), "opened file stream");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            content_type: None,
        })
    }

    /// Open a file read-only. Writes fail with the OS error.
    pub fn open_read_only(path: impl AsRef<Path>) -> MonikerResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            content_type: None,
        })
    }

    /// Create (or truncate) a file.
    pub fn create(path: impl AsRef<Path>) -> MonikerResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            content_type: None,
        })
    }

    /// Report `content_type` from `get_info`.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Stream for FileStream {
    fn read(&mut self, count: i64) -> MonikerResult<Vec<u8>> {
        let len = read_len(count)?;
        let mut data = Vec::with_capacity(len.min(1 << 20));
        (&mut self.file).take(len as u64).read_to_end(&mut data)?;
        Ok(data)
    }

    fn write(&mut self, data: &[u8]) -> MonikerResult<()> {
        self.file.write_all(data)?;
        Ok(())
    }

    fn seek(&mut self, offset: i64, whence: SeekWhence) -> MonikerResult<u64> {
        let target = match whence {
            SeekWhence::Start => {
                let start = u64::try_from(offset)
                    .map_err(|_| MonikerError::io(format!("seek to negative offset {offset}")))?;
                SeekFrom::Start(start)
            }
            SeekWhence::Current => SeekFrom::Current(offset),
            SeekWhence::End => SeekFrom::End(offset),
        };
        Ok(self.file.seek(target)?)
    }

    fn truncate(&mut self, size: u64) -> MonikerResult<()> {
        self.file.set_len(size)?;
        Ok(())
    }

    fn commit(&mut self) -> MonikerResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn revert(&mut self) -> MonikerResult<()> {
        Err(MonikerError::NotSupported {
            operation: "revert on file stream".to_string(),
        })
    }

    fn get_info(&mut self, mask: InfoMask) -> MonikerResult<StreamInfo> {
        let mut info = StreamInfo::default();
        if mask.contains(InfoMask::NAME) {
            info.name = self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if mask.intersects(InfoMask::TYPE | InfoMask::SIZE) {
            let metadata = self.file.metadata()?;
            info.kind = if metadata.is_dir() {
                StorageKind::Directory
            } else {
                StorageKind::Regular
            };
            info.size = metadata.len();
        }
        if mask.contains(InfoMask::CONTENT_TYPE) {
            info.content_type = self.content_type.clone();
        }
        Ok(info)
    }

    fn set_info(&mut self, info: &StreamInfo, mask: InfoMask) -> MonikerResult<()> {
        if mask.intersects(InfoMask::NAME | InfoMask::TYPE) {
            return Err(MonikerError::NotSupported {
                operation: "set_info(name|type) on file stream".to_string(),
            });
        }
        if mask.contains(InfoMask::SIZE) {
            self.file.set_len(info.size)?;
        }
        if mask.contains(InfoMask::CONTENT_TYPE) {
            self.content_type = info.content_type.clone();
        }
        Ok(())
    }
}
