use std::io;
use std::io::Read;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

/// Container signature, the bytes `SLD2` read as a little-endian word.
pub const SDC_SIGNATURE: u32 = 0x3244_4C53;

/// Highest container version this reader understands.
pub const SDC_CURRENT_VERSION: u32 = 0x0000_0101;

/// On-disk size of the container header.
pub(crate) const HEADER_SIZE: usize = 100;

/// On-disk size of one resource position record.
pub(crate) const RESOURCE_RECORD_SIZE: usize = 16;

/// Bit 31 of a record's `size` field flags a compressed resource.
const COMPRESSED_FLAG: u32 = 1 << 31;

/// The fixed 100-byte header at the start of every container.
///
/// All fields are little-endian on disk. The pad and reserved words are kept
/// because the file CRC covers the full header layout.
#[derive(Debug, Clone, Default)]
pub struct ContainerHeader {
    /// Must equal [`SDC_SIGNATURE`].
    pub signature: u32,
    /// Size of the header the writer produced; never larger than 100.
    pub header_size: u32,
    pub version: u32,
    /// CRC-32 of the whole file, computed with this field zeroed.
    pub crc: u32,
    pub file_size: u32,
    pub dict_id: u32,
    pub number_of_resources: u32,
    /// Size of one resource position record; must equal 16.
    pub resource_record_size: u32,
    pub database_type: u32,
    /// Nonzero when the resource table is sorted by `(type, index)`.
    pub is_resource_table_sorted: u32,
    /// Number of property records in the tail array.
    pub base_add_property_count: u32,
    pub is_in_app: u32,
    pub is_resources_have_names: u8,
    pub has_compressed_resources: u8,
    pub pad0: u16,
    /// Tail padding up to the 100-byte layout.
    pub reserved: [u32; 12],
}

impl ContainerHeader {
    pub fn read<R>(r: &mut R) -> io::Result<ContainerHeader>
    where R: Read
    {
        Ok(ContainerHeader {
            signature: r.read_u32::<LittleEndian>()?,
            header_size: r.read_u32::<LittleEndian>()?,
            version: r.read_u32::<LittleEndian>()?,
            crc: r.read_u32::<LittleEndian>()?,
            file_size: r.read_u32::<LittleEndian>()?,
            dict_id: r.read_u32::<LittleEndian>()?,
            number_of_resources: r.read_u32::<LittleEndian>()?,
            resource_record_size: r.read_u32::<LittleEndian>()?,
            database_type: r.read_u32::<LittleEndian>()?,
            is_resource_table_sorted: r.read_u32::<LittleEndian>()?,
            base_add_property_count: r.read_u32::<LittleEndian>()?,
            is_in_app: r.read_u32::<LittleEndian>()?,
            is_resources_have_names: r.read_u8()?,
            has_compressed_resources: r.read_u8()?,
            pad0: r.read_u16::<LittleEndian>()?,
            reserved: {
                let mut reserved = [0u32; 12];
                r.read_u32_into::<LittleEndian>(&mut reserved)?;
                reserved
            },
        })
    }

    pub fn from_bytes(b: &[u8]) -> io::Result<ContainerHeader> {
        ContainerHeader::read(&mut &b[..])
    }

    /// Serializes the header back to its 100-byte on-disk layout.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.signature);
        LittleEndian::write_u32(&mut buf[4..8], self.header_size);
        LittleEndian::write_u32(&mut buf[8..12], self.version);
        LittleEndian::write_u32(&mut buf[12..16], self.crc);
        LittleEndian::write_u32(&mut buf[16..20], self.file_size);
        LittleEndian::write_u32(&mut buf[20..24], self.dict_id);
        LittleEndian::write_u32(&mut buf[24..28], self.number_of_resources);
        LittleEndian::write_u32(&mut buf[28..32], self.resource_record_size);
        LittleEndian::write_u32(&mut buf[32..36], self.database_type);
        LittleEndian::write_u32(&mut buf[36..40], self.is_resource_table_sorted);
        LittleEndian::write_u32(&mut buf[40..44], self.base_add_property_count);
        LittleEndian::write_u32(&mut buf[44..48], self.is_in_app);
        buf[48] = self.is_resources_have_names;
        buf[49] = self.has_compressed_resources;
        LittleEndian::write_u16(&mut buf[50..52], self.pad0);
        LittleEndian::write_u32_into(&self.reserved, &mut buf[52..HEADER_SIZE]);
        buf
    }

    pub(crate) fn has_compression(&self) -> bool {
        self.has_compressed_resources != 0
    }
}

/// A 16-byte resource table record locating one resource in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourcePosition {
    pub res_type: u32,
    /// Resource number among resources of the same type.
    pub index: u32,
    /// Low 31 bits are the stored byte length; bit 31 flags compression.
    pub size: u32,
    /// Offset from the beginning of the file to the resource data.
    pub shift: u32,
}

impl ResourcePosition {
    pub fn from_bytes(buf: &[u8]) -> Self {
        Self {
            res_type: LittleEndian::read_u32(&buf[0..4]),
            index: LittleEndian::read_u32(&buf[4..8]),
            size: LittleEndian::read_u32(&buf[8..12]),
            shift: LittleEndian::read_u32(&buf[12..16]),
        }
    }

    pub fn to_bytes(&self) -> [u8; RESOURCE_RECORD_SIZE] {
        let mut buf = [0u8; RESOURCE_RECORD_SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.res_type);
        LittleEndian::write_u32(&mut buf[4..8], self.index);
        LittleEndian::write_u32(&mut buf[8..12], self.size);
        LittleEndian::write_u32(&mut buf[12..16], self.shift);
        buf
    }

    pub fn is_compressed(&self) -> bool {
        self.size & COMPRESSED_FLAG != 0
    }

    /// Byte length of the resource as stored on disk, without the flag bit.
    pub fn stored_size(&self) -> u32 {
        self.size & !COMPRESSED_FLAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ContainerHeader {
        ContainerHeader {
            signature: SDC_SIGNATURE,
            header_size: HEADER_SIZE as u32,
            version: SDC_CURRENT_VERSION,
            crc: 0xDEAD_BEEF,
            file_size: 120,
            dict_id: 0x4142_4344,
            number_of_resources: 1,
            resource_record_size: RESOURCE_RECORD_SIZE as u32,
            database_type: 3,
            is_resource_table_sorted: 1,
            base_add_property_count: 0,
            is_in_app: 0,
            is_resources_have_names: 0,
            has_compressed_resources: 0,
            pad0: 0,
            reserved: [0; 12],
        }
    }

    #[test]
    fn test_header_round_trip() {
        let h = sample_header();
        let bytes = h.to_bytes();
        assert_eq!(&bytes[0..4], b"SLD2");

        let back = ContainerHeader::from_bytes(&bytes).unwrap();
        assert_eq!(back.signature, SDC_SIGNATURE);
        assert_eq!(back.version, SDC_CURRENT_VERSION);
        assert_eq!(back.crc, 0xDEAD_BEEF);
        assert_eq!(back.file_size, 120);
        assert_eq!(back.number_of_resources, 1);
        assert_eq!(back.is_resource_table_sorted, 1);
    }

    #[test]
    fn test_header_short_read() {
        let h = sample_header();
        let bytes = h.to_bytes();
        assert!(ContainerHeader::from_bytes(&bytes[..HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn test_position_compression_flag() {
        let pos = ResourcePosition { res_type: 7, index: 3, size: 0x8000_0010, shift: 116 };
        assert!(pos.is_compressed());
        assert_eq!(pos.stored_size(), 0x10);

        let plain = ResourcePosition::from_bytes(&pos.to_bytes());
        assert_eq!(plain, pos);

        let pos = ResourcePosition { size: 4, ..pos };
        assert!(!pos.is_compressed());
        assert_eq!(pos.stored_size(), 4);
    }
}
