use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Random-access byte source backing an open container.
///
/// The reader never seeks; every read is absolute. `read_at` reports the
/// number of bytes actually written to `dst`, and anything short of
/// `dst.len()` counts as a failed read that the reader does not retry.
pub trait SdcFile {
    /// Checks whether the source is open and readable.
    fn is_open(&self) -> bool;

    /// Reads `dst.len()` bytes starting `offset` bytes from the beginning of
    /// the file. Returns the number of bytes actually read.
    fn read_at(&mut self, dst: &mut [u8], offset: u32) -> u32;

    /// Returns the size of the file in bytes.
    fn size(&self) -> u32;
}

impl SdcFile for File {
    fn is_open(&self) -> bool {
        true
    }

    fn read_at(&mut self, dst: &mut [u8], offset: u32) -> u32 {
        if self.seek(SeekFrom::Start(offset.into())).is_err() {
            return 0;
        }
        let mut total = 0;
        while total < dst.len() {
            match self.read(&mut dst[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        total as u32
    }

    fn size(&self) -> u32 {
        self.metadata().map(|m| m.len() as u32).unwrap_or(0)
    }
}

/// In-memory containers. This is the backend the test suite runs on.
impl<T: AsRef<[u8]>> SdcFile for Cursor<T> {
    fn is_open(&self) -> bool {
        true
    }

    fn read_at(&mut self, dst: &mut [u8], offset: u32) -> u32 {
        let data = self.get_ref().as_ref();
        let start = data.len().min(offset as usize);
        let end = data.len().min(start + dst.len());
        dst[..end - start].copy_from_slice(&data[start..end]);
        (end - start) as u32
    }

    fn size(&self) -> u32 {
        self.get_ref().as_ref().len() as u32
    }
}
