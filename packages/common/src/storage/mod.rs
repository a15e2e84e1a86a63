mod error;
mod hash;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemContentStore;
pub use hash::{ContentHash, HashSums, MultiHasher};
pub use traits::{BoxReader, ContentStore};
