pub mod package;
pub mod package_blob;
pub mod package_blob_upload;
pub mod package_cleanup_rule;
pub mod package_file;
pub mod package_property;
pub mod package_version;
pub mod repository;
pub mod team;
pub mod team_user;
pub mod user;
