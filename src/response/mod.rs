//! Response handling module - data URLs and archive packaging

pub mod archive;
pub mod data_url;

pub use archive::{ArchivePackager, DirectoryPackager, PackagedArchive};
