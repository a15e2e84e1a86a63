pub mod access;
pub mod config;
pub mod package_type;
pub mod property_type;
pub mod storage;

pub use access::{AccessMode, Visibility};
pub use package_type::PackageType;
pub use property_type::PropertyType;
