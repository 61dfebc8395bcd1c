//! Random Access File
//!
//! A thin positional wrapper over `std::fs::File`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A single file addressed by absolute byte offsets
///
/// All methods take `&mut self`: the seek position is shared state, so callers
/// serialize access (both tables live behind the storage mutex).
pub struct RandomAccessFile {
    /// Path of the backing file (for diagnostics)
    path: PathBuf,
    /// Open descriptor, `None` once disposed
    file: Option<File>,
    /// Logical length in bytes
    length: u64,
}

impl RandomAccessFile {
    /// Open or create the file at `path` without truncating it
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let length = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            length,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn get_i32(&mut self, offset: u64) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.get(offset, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn put_i32(&mut self, offset: u64, value: i32) -> io::Result<()> {
        self.put(offset, &value.to_le_bytes())
    }

    pub fn get_i64(&mut self, offset: u64) -> io::Result<i64> {
        let mut buf = [0u8; 8];
        self.get(offset, &mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn put_i64(&mut self, offset: u64, value: i64) -> io::Result<()> {
        self.put(offset, &value.to_le_bytes())
    }

    /// Fill `buf` with the bytes starting at `offset`
    ///
    /// Fails with `UnexpectedEof` if the range extends past the end of file.
    pub fn get(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let file = self.handle()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    /// Write `bytes` at `offset`, growing the file if needed
    pub fn put(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let file = self.handle()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytes)?;

        self.length = self.length.max(offset + bytes.len() as u64);
        Ok(())
    }

    /// Flush file contents and metadata to disk
    pub fn force(&mut self) -> io::Result<()> {
        self.handle()?.sync_all()
    }

    /// Flush and release the descriptor. Later calls fail; a second
    /// `dispose` is a no-op.
    pub fn dispose(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(file) => file.sync_all(),
            None => Ok(()),
        }
    }

    /// True until `dispose` is called
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn handle(&mut self) -> io::Result<&mut File> {
        let path = &self.path;
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("{} is already disposed", path.display()),
            )
        })
    }
}
