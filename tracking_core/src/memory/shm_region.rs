// Memory-mapped file shared between processes
use crate::error::{TrackingError, TrackingResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Shared memory region backed by a file under [`shm_topics_dir`](super::shm_topics_dir)
#[derive(Debug)]
pub struct ShmRegion {
    mmap: MmapMut,
    path: PathBuf,
    _file: File,
    owner: bool,
}

impl ShmRegion {
    /// Create the backing file with `size` zeroed bytes, or open it when it exists
    ///
    /// Only the process that created the file is the owner; it is expected
    /// to initialize the contents before others use them.
    pub fn create_or_open(path: &Path, size: usize) -> TrackingResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => {
                // A fresh file reads as zeros, no explicit fill needed
                file.set_len(size as u64)?;
                Self::map(file, path, size, true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Self::open(path),
            Err(e) => Err(e.into()),
        }
    }

    /// Map an existing backing file as a whole (no creation)
    pub fn open(path: &Path) -> TrackingResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len() as usize;
        Self::map(file, path, size, false)
    }

    fn map(file: File, path: &Path, size: usize, owner: bool) -> TrackingResult<Self> {
        if size == 0 {
            return Err(TrackingError::Communication(format!(
                "Shared memory file {} is empty",
                path.display()
            )));
        }
        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file)? };

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            _file: file,
            owner,
        })
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_open_shares_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region");

        let mut first = ShmRegion::create_or_open(&path, 4096).unwrap();
        let second = ShmRegion::create_or_open(&path, 4096).unwrap();
        assert!(first.is_owner());
        assert!(!second.is_owner());
        assert_eq!(second.size(), 4096);

        unsafe { *first.as_mut_ptr().add(10) = 42 };
        assert_eq!(unsafe { *second.as_ptr().add(10) }, 42);
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(
            ShmRegion::open(&path),
            Err(TrackingError::Communication(_))
        ));
    }
}
