use std::io;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::error::SldError;

/// On-disk size of the header stored in front of every compressed resource.
pub(crate) const COMPRESSED_HEADER_SIZE: usize = 8;

/// Algorithm a resource is compressed with.
///
/// `None` is the only algorithm the format currently defines; an on-disk
/// value with no variant here fails `try_from` and the resource is refused.
#[derive(Debug, IntoPrimitive, TryFromPrimitive, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CompressionType {
    None = 0,
}

/// The 8-byte header stored immediately before a compressed resource's
/// packed bytes: algorithm, 2 bytes padding, original size.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompressedResourceHeader {
    pub compression_type: u16,
    pub uncompressed_size: u32,
}

impl CompressedResourceHeader {
    pub fn read<R>(r: &mut R) -> io::Result<CompressedResourceHeader>
    where R: Read
    {
        let compression_type = r.read_u16::<LittleEndian>()?;
        let _pad = r.read_u16::<LittleEndian>()?;
        let uncompressed_size = r.read_u32::<LittleEndian>()?;
        Ok(CompressedResourceHeader { compression_type, uncompressed_size })
    }

    pub fn from_bytes(b: &[u8]) -> io::Result<CompressedResourceHeader> {
        CompressedResourceHeader::read(&mut &b[..])
    }
}

/// Unpacks the payload of a compressed resource into `dst`, which holds at
/// most the resource's uncompressed size. A future algorithm gets a new
/// match arm here.
pub(crate) fn unpack_into(
    ctype: CompressionType,
    payload: &[u8],
    dst: &mut [u8],
) -> Result<(), SldError> {
    match ctype {
        CompressionType::None => {
            if payload.len() < dst.len() {
                return Err(SldError::ResourceCantGetResource);
            }
            dst.copy_from_slice(&payload[..dst.len()]);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parse() {
        let raw = [0u8, 0, 0, 0, 8, 0, 0, 0];
        let h = CompressedResourceHeader::from_bytes(&raw).unwrap();
        assert_eq!(h.compression_type, 0);
        assert_eq!(h.uncompressed_size, 8);
    }

    #[test]
    fn test_unknown_compression_type() {
        assert!(CompressionType::try_from(0u16).is_ok());
        assert!(CompressionType::try_from(1u16).is_err());
        assert!(CompressionType::try_from(0xFFFFu16).is_err());
    }

    #[test]
    fn test_unpack_none() {
        let payload = [0xAAu8, 0xBB, 0xCC, 0xDD];
        let mut dst = [0u8; 4];
        unpack_into(CompressionType::None, &payload, &mut dst).unwrap();
        assert_eq!(dst, payload);

        // truncated payload is refused
        let mut dst = [0u8; 5];
        assert_eq!(
            unpack_into(CompressionType::None, &payload, &mut dst),
            Err(SldError::ResourceCantGetResource)
        );
    }
}
