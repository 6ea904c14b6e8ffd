//! Reader for the SDC container format.
//!
//! Every piece of data in a container is a *resource*: an opaque byte blob
//! identified by a `(type, index)` pair. Resources of the same type are
//! numbered independently, numbers need not be contiguous, and no two
//! resources share both type and number. The file layout is:
//!
//! ```text
//! [header]                          100 bytes, little-endian
//! [resource position table]         16 bytes per resource
//! [resource data, in table order]
//! [property array]                  2048-byte records at the file tail
//! ```
//!
//! The header records a CRC-32 over the whole file (computed with the CRC
//! field itself zeroed), checked by [`SdcReader::check_data`]. When the
//! header flags the position table as sorted, lookups binary-search it by
//! `(type, index)`. Properties are `(name, value)` UTF-16 pairs sorted by
//! name, served by [`SdcReader::get_property_by_key`] and
//! [`SdcReader::get_property_by_index`].

mod cache;
mod compressed;
mod crc;
mod file;
mod header;
mod property;
mod reader;

pub mod error;

pub use cache::{Resource, ResourceHandle};
pub use compressed::CompressionType;
pub use file::SdcFile;
pub use header::{ContainerHeader, ResourcePosition, SDC_CURRENT_VERSION, SDC_SIGNATURE};
pub use reader::{file_crc, SdcReader};
