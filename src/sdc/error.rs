//! Error codes for container operations.
//!
//! Two families are kept for compatibility with the callers layered above
//! this crate: [`SldError`] is the engine-level family shared with the
//! dictionary object model, [`SdcError`] is the container-level family whose
//! numeric values the format itself defines. Neither carries an `OK` code;
//! success travels through `Result`.

use num_enum::IntoPrimitive;
use thiserror::Error;

/// Engine-level error codes produced by the resource access paths.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u32)]
pub enum SldError {
    #[error("null pointer")]
    MemoryNullPointer = 0x0101,
    #[error("out of memory")]
    MemoryNotEnoughMemory = 0x0102,
    #[error("cannot open container")]
    ResourceCantOpenContainer = 0x0301,
    #[error("cannot load resource")]
    ResourceCantGetResource = 0x0302,
    #[error("container version is newer than this reader")]
    CommonTooHighDictionaryVersion = 0x0401,
}

/// Container-level error codes, numbered as the format defines them.
///
/// The `Write*` codes belong to the producer side of the format and are never
/// returned by this reader.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u32)]
pub enum SdcError {
    #[error("null pointer")]
    MemNullPointer = 0x0101,
    #[error("out of memory")]
    MemNotEnoughMemory = 0x0102,
    #[error("tried to add an empty resource")]
    WriteEmptyResource = 0x0201,
    #[error("resource already exists")]
    WriteAlreadyExist = 0x0202,
    #[error("cannot create file")]
    WriteCantCreateFile = 0x0203,
    #[error("file write error")]
    WriteCantWrite = 0x0204,
    #[error("cannot sort the resource table")]
    WriteCantSortResourceTable = 0x0205,
    #[error("cannot open file")]
    ReadCantOpenFile = 0x0301,
    #[error("cannot read the requested amount of data")]
    ReadCantRead = 0x0302,
    #[error("wrong signature")]
    ReadWrongSignature = 0x0303,
    #[error("wrong resource index")]
    ReadWrongIndex = 0x0304,
    #[error("cannot position to the requested offset")]
    ReadCantPositioning = 0x0305,
    #[error("resource not found")]
    ReadResourceNotFound = 0x0306,
    #[error("container not opened")]
    ReadNotOpened = 0x0307,
    #[error("wrong file size")]
    ReadWrongFilesize = 0x0308,
    #[error("checksum mismatch")]
    ReadWrongCrc = 0x0309,
    #[error("wrong property index")]
    ReadWrongPropertyIndex = 0x030A,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_codes() {
        assert_eq!(u32::from(SdcError::MemNullPointer), 0x0101);
        assert_eq!(u32::from(SdcError::ReadWrongCrc), 0x0309);
        assert_eq!(u32::from(SdcError::ReadWrongPropertyIndex), 0x030A);
        assert_eq!(u32::from(SldError::ResourceCantGetResource), 0x0302);
    }
}
