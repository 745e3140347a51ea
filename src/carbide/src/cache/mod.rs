pub mod storage;

pub use storage::{BlobStore, FsBlobStore, MemoryBlobStore};
