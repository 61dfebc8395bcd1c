//! File I/O Module
//!
//! Positional access to a single backing file.
//!
//! ## Responsibilities
//! - Read/write little-endian integers at absolute offsets
//! - Read/write raw byte ranges at absolute offsets
//! - Track the logical file length (grows on writes past the end)
//! - Flush to disk and release the descriptor
//!
//! Caching and paging policy are left to the operating system; both tables
//! call into this layer while holding their owner's exclusive lock.

mod file;

pub use file::RandomAccessFile;
