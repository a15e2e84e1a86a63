pub mod access;
pub mod blob;
pub mod catalog;
pub mod cleanup;
pub mod config;
pub mod database;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod file;
pub mod insert;
pub mod metadata;
pub mod property;
pub mod service;
pub mod upload;

pub use access::Principal;
pub use blob::BlobStore;
pub use catalog::PackageCatalog;
pub use cleanup::{PatternCache, RetentionEngine};
pub use config::{DatabaseConfig, LimitsConfig};
pub use descriptor::{PackageDescriptor, get_package_descriptor, get_package_descriptors};
pub use error::{PackageError, PackageResult};
pub use file::FileIndex;
pub use metadata::Metadata;
pub use property::PropertyStore;
pub use service::PackageService;
pub use upload::UploadTracker;
