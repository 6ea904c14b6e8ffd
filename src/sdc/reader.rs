use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use super::cache::{Resource, ResourceCache, ResourceHandle};
use super::compressed::{self, CompressedResourceHeader, CompressionType, COMPRESSED_HEADER_SIZE};
use super::crc::{crc32, CRC32_START_VALUE};
use super::error::{SdcError, SldError};
use super::file::SdcFile;
use super::header::{
    ContainerHeader, ResourcePosition, HEADER_SIZE, RESOURCE_RECORD_SIZE, SDC_CURRENT_VERSION,
    SDC_SIGNATURE,
};
use super::property;

/// Block size for streaming the file body through the CRC engine.
const CRC_DATA_BLOCK_SIZE: usize = 0xFFFF;

/// Random-access reader over an SDC container.
///
/// A reader starts out closed. [`open`] decodes the header, validates it and
/// loads the resource position table; after that [`get_resource`] serves
/// `(type, index)` requests from a refcounted in-memory cache, falling back
/// to the file on a miss. [`check_data`] verifies the whole file against the
/// CRC recorded in the header.
///
/// Any operation other than `open` on a closed reader fails deterministically
/// without touching the file. A reader instance is not safe for concurrent
/// access; distinct instances over distinct files are independent.
///
/// [`open`]: SdcReader::open
/// [`get_resource`]: SdcReader::get_resource
/// [`check_data`]: SdcReader::check_data
#[derive(Debug)]
pub struct SdcReader<F> {
    file: Option<F>,
    header: ContainerHeader,
    res_table: Vec<ResourcePosition>,
    cache: Rc<RefCell<ResourceCache>>,
    /// Scratch for reading packed resources, grown on demand.
    compressed_buf: Vec<u8>,
    /// Scratch for one property record, allocated on first property access.
    property_buf: Vec<u8>,
}

impl<F: SdcFile> SdcReader<F> {
    /// Creates a closed reader.
    pub fn new() -> SdcReader<F> {
        SdcReader {
            file: None,
            header: ContainerHeader::default(),
            res_table: Vec::new(),
            cache: Rc::new(RefCell::new(ResourceCache::new())),
            compressed_buf: Vec::new(),
            property_buf: Vec::new(),
        }
    }

    /// Opens `file` as an SDC container, decoding and validating the header
    /// and loading the resource position table. An already-open reader is
    /// closed first; on failure the reader is closed again.
    pub fn open(&mut self, file: F) -> Result<(), SldError> {
        if !file.is_open() {
            return Err(SldError::ResourceCantOpenContainer);
        }

        self.close();
        self.file = Some(file);

        match self.read_header_and_table() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn read_header_and_table(&mut self) -> Result<(), SldError> {
        let file = self.file.as_mut().ok_or(SldError::ResourceCantOpenContainer)?;

        let mut raw = [0u8; HEADER_SIZE];
        if file.read_at(&mut raw, 0) != HEADER_SIZE as u32 {
            return Err(SldError::ResourceCantOpenContainer);
        }
        let header =
            ContainerHeader::from_bytes(&raw).map_err(|_| SldError::ResourceCantOpenContainer)?;

        if header.signature != SDC_SIGNATURE {
            return Err(SldError::ResourceCantOpenContainer);
        }
        if header.header_size as usize > HEADER_SIZE
            || header.version > SDC_CURRENT_VERSION
            || header.resource_record_size as usize != RESOURCE_RECORD_SIZE
        {
            return Err(SldError::CommonTooHighDictionaryVersion);
        }

        // A table that cannot fit in the file is corruption; rejecting it
        // here keeps a bogus resource count from driving a giant allocation.
        let count = header.number_of_resources as usize;
        let table_size = count * RESOURCE_RECORD_SIZE;
        if header.header_size as u64 + table_size as u64 > u64::from(file.size()) {
            return Err(SldError::ResourceCantOpenContainer);
        }

        let mut raw_table = vec![0u8; table_size];
        if file.read_at(&mut raw_table, header.header_size) != table_size as u32 {
            return Err(SldError::ResourceCantOpenContainer);
        }

        let mut res_table = Vec::with_capacity(count);
        for record in raw_table.chunks_exact(RESOURCE_RECORD_SIZE) {
            res_table.push(ResourcePosition::from_bytes(record));
        }

        self.header = header;
        self.res_table = res_table;
        // zero, but keep, a property scratch left over from a previous open
        self.property_buf.fill(0);
        Ok(())
    }

    /// Closes the container. The resource table and the property scratch are
    /// released, every loaded cache slot moves to the free list (outstanding
    /// handles keep their data but no longer count as cached), and the
    /// header is zeroed. The freed slots stay allocated for the next open.
    pub fn close(&mut self) {
        self.file = None;
        self.res_table = Vec::new();
        self.cache.borrow_mut().clear();
        self.property_buf = Vec::new();
        self.header = ContainerHeader::default();
    }

    /// Checks whether a container is currently open.
    pub fn is_open(&self) -> bool {
        self.file.as_ref().map_or(false, |f| f.is_open())
    }

    /// The underlying container file, when one is attached.
    pub fn file_mut(&mut self) -> Option<&mut F> {
        self.file.as_mut()
    }

    /// Content type of the open container, or 0 when closed.
    pub fn database_type(&self) -> u32 {
        if self.is_open() {
            self.header.database_type
        } else {
            0
        }
    }

    /// Nonzero when the open container is an in-app (demo) database; 0 when
    /// closed.
    pub fn is_in_app(&self) -> u32 {
        if self.is_open() {
            self.header.is_in_app
        } else {
            0
        }
    }

    /// Number of resources in the open container, or 0 when closed.
    pub fn number_of_resources(&self) -> u32 {
        if self.is_open() {
            self.header.number_of_resources
        } else {
            0
        }
    }

    /// Number of properties in the tail array, or 0 when closed.
    pub fn number_of_properties(&self) -> u32 {
        self.header.base_add_property_count
    }

    /// Gets a resource by its type and number.
    ///
    /// A resource already in the cache gains a reference and is promoted to
    /// most-recently-used without touching the file. On a miss the resource
    /// is read (and unpacked, for compressed resources), cached in a
    /// recycled or fresh slot, and handed back with one reference.
    pub fn get_resource(&mut self, res_type: u32, index: u32) -> ResourceHandle {
        if self.file.is_none() {
            return Err(SldError::ResourceCantGetResource);
        }

        if let Some((slot, data)) = self.cache.borrow_mut().find_loaded(res_type, index) {
            return Ok(Resource::new(Rc::clone(&self.cache), slot, data, res_type, index));
        }

        let position = self
            .find_position(res_type, index)
            .ok_or(SldError::ResourceCantGetResource)?;

        let data: Rc<[u8]> = if self.header.has_compression() && position.is_compressed() {
            self.load_compressed(&position)?.into()
        } else {
            self.load_plain(&position)?.into()
        };

        let slot = self.cache.borrow_mut().insert(res_type, index, Rc::clone(&data));
        Ok(Resource::new(Rc::clone(&self.cache), slot, data, res_type, index))
    }

    /// Reads resource data straight into `dst`, bypassing the cache.
    ///
    /// Returns the actual size of the resource data; at most `dst.len()`
    /// bytes are written. An empty `dst` is a no-op returning 0.
    pub fn get_resource_data(
        &mut self,
        dst: &mut [u8],
        res_type: u32,
        index: u32,
    ) -> Result<u32, SldError> {
        if self.file.is_none() {
            return Err(SldError::ResourceCantGetResource);
        }
        if dst.is_empty() {
            return Ok(0);
        }

        let position = self
            .find_position(res_type, index)
            .ok_or(SldError::ResourceCantGetResource)?;

        if self.header.has_compression() && position.is_compressed() {
            let header = self.read_compressed_header(&position)?;
            let ctype = CompressionType::try_from(header.compression_type)
                .map_err(|_| SldError::ResourceCantGetResource)?;
            let payload =
                &self.compressed_buf[COMPRESSED_HEADER_SIZE..position.stored_size() as usize];
            // truncation is judged against the full declared size, not
            // against however much of it fits the caller's buffer
            if payload.len() < header.uncompressed_size as usize {
                return Err(SldError::ResourceCantGetResource);
            }
            let n = (header.uncompressed_size as usize).min(dst.len());
            compressed::unpack_into(ctype, payload, &mut dst[..n])?;
            return Ok(header.uncompressed_size);
        }

        let read_size = position.size.min(dst.len() as u32);
        let file = self.file.as_mut().ok_or(SldError::ResourceCantGetResource)?;
        if file.read_at(&mut dst[..read_size as usize], position.shift) != read_size {
            return Err(SldError::ResourceCantGetResource);
        }
        Ok(read_size)
    }

    /// Gets the file offset and the stored size field of a resource.
    pub fn get_resource_shift_and_size(
        &self,
        res_type: u32,
        index: u32,
    ) -> Result<(u32, u32), SldError> {
        self.find_position(res_type, index)
            .map(|p| (p.shift, p.size))
            .ok_or(SldError::ResourceCantGetResource)
    }

    /// Looks up a property value by key.
    ///
    /// The tail array is sorted by name in property-index order (index `i`
    /// lives `(i + 1)` records before the end of the file), so the search is
    /// a binary search over that order, reading only the name field of the
    /// probed record; the value field is read adjacently on a hit.
    pub fn get_property_by_key(&mut self, key: &str) -> Option<String> {
        let count = self.header.base_add_property_count;
        if self.file.is_none() || count == 0 {
            return None;
        }

        let span = u64::from(count) * property::PROPERTY_RECORD_SIZE as u64;
        if span > u64::from(self.header.file_size) {
            return None;
        }
        let file_size = self.header.file_size;
        let key = property::encode_key(key);

        if self.property_buf.is_empty() {
            self.property_buf = vec![0u8; property::PROPERTY_RECORD_SIZE];
        }
        let file = self.file.as_mut()?;
        let (name, value) = self.property_buf.split_at_mut(property::PROPERTY_FIELD_SIZE);

        let (mut lo, mut hi) = (0u32, count);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let offset = file_size - (mid + 1) * property::PROPERTY_RECORD_SIZE as u32;
            if file.read_at(name, offset) != property::PROPERTY_FIELD_SIZE as u32 {
                break;
            }
            match property::cmp_utf16(name, &key) {
                Ordering::Equal => {
                    let value = &mut value[..property::PROPERTY_FIELD_SIZE];
                    let value_offset = offset + property::PROPERTY_FIELD_SIZE as u32;
                    if file.read_at(value, value_offset) != property::PROPERTY_FIELD_SIZE as u32 {
                        break;
                    }
                    return Some(property::decode_field(value));
                }
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }

        self.property_buf.fill(0);
        None
    }

    /// Gets the key and value of the property at `index` in the tail array.
    pub fn get_property_by_index(&mut self, index: u32) -> Result<(String, String), SdcError> {
        if self.file.is_none() {
            return Err(SdcError::MemNullPointer);
        }
        if index >= self.header.base_add_property_count {
            return Err(SdcError::ReadWrongPropertyIndex);
        }

        let span = u64::from(index + 1) * property::PROPERTY_RECORD_SIZE as u64;
        let offset = u64::from(self.header.file_size)
            .checked_sub(span)
            .ok_or(SdcError::ReadCantRead)? as u32;

        if self.property_buf.is_empty() {
            self.property_buf = vec![0u8; property::PROPERTY_RECORD_SIZE];
        }
        let file = self.file.as_mut().ok_or(SdcError::MemNullPointer)?;
        if file.read_at(&mut self.property_buf, offset) != property::PROPERTY_RECORD_SIZE as u32 {
            return Err(SdcError::ReadCantRead);
        }

        let name = &self.property_buf[..property::PROPERTY_FIELD_SIZE];
        let value = &self.property_buf
            [property::PROPERTY_FIELD_SIZE..2 * property::PROPERTY_FIELD_SIZE];
        Ok((property::decode_field(name), property::decode_field(value)))
    }

    /// Verifies the container: the file length must match the header and the
    /// CRC-32 streamed over the whole file must equal the recorded one.
    pub fn check_data(&mut self) -> Result<(), SdcError> {
        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Err(SdcError::MemNullPointer),
        };
        if !file.is_open() {
            return Err(SdcError::ReadNotOpened);
        }
        if file.size() != self.header.file_size {
            return Err(SdcError::ReadWrongFilesize);
        }

        // The writer computed the recorded CRC with the header's own crc
        // field zeroed.
        let mut header = self.header.clone();
        header.crc = 0;

        let crc = file_crc(&header, file)?;
        if crc != self.header.crc {
            return Err(SdcError::ReadWrongCrc);
        }
        Ok(())
    }

    /// Finds the position record for `(res_type, index)`. Binary search over
    /// the two-field key when the table is sorted, linear scan otherwise.
    fn find_position(&self, res_type: u32, index: u32) -> Option<ResourcePosition> {
        let table = &self.res_table;
        if table.is_empty() {
            return None;
        }

        if self.header.is_resource_table_sorted != 0 {
            if table[0].res_type > res_type || table[table.len() - 1].res_type < res_type {
                return None;
            }

            let at = table.partition_point(|p| {
                if p.res_type == res_type {
                    p.index < index
                } else {
                    p.res_type < res_type
                }
            });
            match table.get(at) {
                Some(p) if p.res_type == res_type && p.index == index => Some(*p),
                _ => None,
            }
        } else {
            table
                .iter()
                .find(|p| p.res_type == res_type && p.index == index)
                .copied()
        }
    }

    fn load_plain(&mut self, position: &ResourcePosition) -> Result<Vec<u8>, SldError> {
        let file = self.file.as_mut().ok_or(SldError::ResourceCantGetResource)?;
        if u64::from(position.size) > u64::from(file.size()) {
            return Err(SldError::ResourceCantGetResource);
        }

        let mut data = vec![0u8; position.size as usize];
        if file.read_at(&mut data, position.shift) != position.size {
            return Err(SldError::ResourceCantGetResource);
        }
        Ok(data)
    }

    fn load_compressed(&mut self, position: &ResourcePosition) -> Result<Vec<u8>, SldError> {
        let header = self.read_compressed_header(position)?;
        let ctype = CompressionType::try_from(header.compression_type)
            .map_err(|_| SldError::ResourceCantGetResource)?;

        // a declared size the file could never back is corruption; reject it
        // before it sizes the allocation
        let file = self.file.as_ref().ok_or(SldError::ResourceCantGetResource)?;
        if u64::from(header.uncompressed_size) > u64::from(file.size()) {
            return Err(SldError::ResourceCantGetResource);
        }

        let payload = &self.compressed_buf[COMPRESSED_HEADER_SIZE..position.stored_size() as usize];
        let mut data = vec![0u8; header.uncompressed_size as usize];
        compressed::unpack_into(ctype, payload, &mut data)?;
        Ok(data)
    }

    /// Reads a compressed resource's full stored bytes into the scratch
    /// buffer and parses the compression header at its front.
    fn read_compressed_header(
        &mut self,
        position: &ResourcePosition,
    ) -> Result<CompressedResourceHeader, SldError> {
        let stored = position.stored_size() as usize;
        if stored < COMPRESSED_HEADER_SIZE {
            return Err(SldError::ResourceCantGetResource);
        }

        let file = self.file.as_mut().ok_or(SldError::ResourceCantGetResource)?;
        if stored as u64 > u64::from(file.size()) {
            return Err(SldError::ResourceCantGetResource);
        }
        if stored > self.compressed_buf.len() {
            self.compressed_buf.resize(stored, 0);
        }
        if file.read_at(&mut self.compressed_buf[..stored], position.shift) != stored as u32 {
            return Err(SldError::ResourceCantGetResource);
        }

        CompressedResourceHeader::from_bytes(&self.compressed_buf)
            .map_err(|_| SldError::ResourceCantGetResource)
    }
}

impl<F: SdcFile> Default for SdcReader<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the CRC-32 of a whole container file for the given header.
///
/// The header is hashed from its in-memory form (so a caller can zero the
/// `crc` field first), the resource table is read back from the file, and
/// the body is streamed in blocks with the final invert applied on the last
/// one.
pub fn file_crc<F: SdcFile>(header: &ContainerHeader, file: &mut F) -> Result<u32, SdcError> {
    let mut crc = crc32(&header.to_bytes(), CRC32_START_VALUE, false);

    let table_size =
        u64::from(header.resource_record_size) * u64::from(header.number_of_resources);
    if header.header_size as u64 + table_size > u64::from(file.size()) {
        return Err(SdcError::ReadCantRead);
    }
    let table_size = table_size as usize;

    let mut buf = vec![0u8; table_size.max(CRC_DATA_BLOCK_SIZE)];
    if file.read_at(&mut buf[..table_size], header.header_size) != table_size as u32 {
        return Err(SdcError::ReadCantRead);
    }
    crc = crc32(&buf[..table_size], crc, false);

    let mut offset = header.header_size + table_size as u32;
    let mut remaining = header.file_size.saturating_sub(offset);
    while remaining > 0 {
        let read_size = remaining.min(CRC_DATA_BLOCK_SIZE as u32) as usize;
        if file.read_at(&mut buf[..read_size], offset) != read_size as u32 {
            return Err(SdcError::ReadCantRead);
        }
        remaining -= read_size as u32;
        offset += read_size as u32;
        crc = crc32(&buf[..read_size], crc, remaining == 0);
    }
    Ok(crc)
}
