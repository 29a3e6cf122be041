//! Chunk allocation and load protocol

pub mod allocate;
pub mod directive;
pub mod load;
pub mod report;
pub mod scan;

pub use allocate::{AllocationOutcome, ChunkAllocator};
pub use directive::{read_manifest, write_manifest, LoadDirective};
pub use load::ChunkLoader;
pub use report::{BatchReport, ChunkFailure, ChunkStep};
pub use scan::{chunk_id_from_name, scan_chunk_directory, ChunkFile, ChunkListing};
