//! Sdcont provides read-only access to ***SDC*** (SlovoEd Data Container)
//! files. An SDC container packs heterogeneous binary resources (wordlist
//! indexes, articles, Huffman trees, comparison tables, media) into a single
//! file, addressed by `(type, index)` pairs. The API focuses on random
//! resource access with integrity verification and a refcounted in-memory
//! cache of recently loaded resources.
//!
//! # Usage Example
//! ```rust
//! use std::fs::File;
//! use sdcont::sdc::{SdcReader, error::SldError};
//!
//! fn read_from_container(file: File) -> Result<(), SldError> {
//!     // Open the container
//!     let mut reader = SdcReader::new();
//!     reader.open(file)?;
//!
//!     // Resources are addressed by (type, index); repeated gets hit the cache
//!     let res = reader.get_resource(0x0101, 0)?;
//!     println!("resource 0x0101/0: {} bytes", res.size());
//!
//!     // Product metadata lives in the property sidecar at the file tail
//!     if let Some(brand) = reader.get_property_by_key("brand") {
//!         println!("brand: {}", brand);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! A reader instance is single-threaded: the handles it returns share its
//! cache and must stay on the owning thread. Distinct readers over distinct
//! files are fully independent.

pub mod sdc;
