use common::PropertyType;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, TransactionTrait};

use crate::blob::BlobStore;
use crate::catalog::{PackageCatalog, parse_semver};
use crate::entity::{
    package, package_blob, package_file, package_property, package_version, repository, user,
};
use crate::error::PackageResult;
use crate::file::FileIndex;
use crate::metadata::Metadata;
use crate::property::PropertyStore;

/// Everything known about one package version.
#[derive(Debug, Clone)]
pub struct PackageDescriptor {
    pub package: package::Model,
    pub owner: user::Model,
    pub repository: Option<repository::Model>,
    pub version: package_version::Model,
    /// Parsed version, for semver-compatible packages whose version parses.
    pub semver: Option<semver::Version>,
    /// `None` once the uploading account is gone.
    pub creator: Option<user::Model>,
    pub version_properties: Vec<package_property::Model>,
    pub metadata: Metadata,
    pub files: Vec<PackageFileDescriptor>,
}

#[derive(Debug, Clone)]
pub struct PackageFileDescriptor {
    pub file: package_file::Model,
    pub blob: package_blob::Model,
    pub properties: Vec<package_property::Model>,
}

impl PackageDescriptor {
    pub fn lead_file(&self) -> Option<&PackageFileDescriptor> {
        self.files.iter().find(|f| f.file.is_lead)
    }

    /// Total size of the version's files.
    pub fn calculate_blob_size(&self) -> i64 {
        self.files.iter().map(|f| f.blob.size).sum()
    }

    /// Value of the first version property with this name.
    pub fn version_property(&self, name: &str) -> Option<&str> {
        self.version_properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }
}

/// Assemble the descriptor of a version. Runs one query per file.
pub async fn get_package_descriptor<C>(
    conn: &C,
    version: &package_version::Model,
) -> PackageResult<PackageDescriptor>
where
    C: ConnectionTrait + TransactionTrait,
{
    let package = PackageCatalog::new(conn)
        .get_package_by_id(version.package_id)
        .await?;
    let owner = user::Entity::find_by_id(package.owner_id)
        .one(conn)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("owner {} of package", package.owner_id)))?;
    let repository = match package.repo_id {
        Some(repo_id) => repository::Entity::find_by_id(repo_id).one(conn).await?,
        None => None,
    };
    let creator = user::Entity::find_by_id(version.creator_id)
        .one(conn)
        .await?;

    let properties = PropertyStore::new(conn);
    let version_properties = properties
        .get_properties(PropertyType::Version, version.id)
        .await?;

    let semver = if package.semver_compatible {
        parse_semver(&version.version)
    } else {
        None
    };
    let metadata = Metadata::decode(package.package_type, &version.metadata_json)?;

    let blobs = BlobStore::new(conn);
    let mut files = Vec::new();
    for file in FileIndex::new(conn)
        .get_files_by_version_id(version.id)
        .await?
    {
        let blob = blobs.get_by_id(file.blob_id).await?;
        let properties = properties
            .get_properties(PropertyType::File, file.id)
            .await?;
        files.push(PackageFileDescriptor {
            file,
            blob,
            properties,
        });
    }

    Ok(PackageDescriptor {
        package,
        owner,
        repository,
        version: version.clone(),
        semver,
        creator,
        version_properties,
        metadata,
        files,
    })
}

/// [`get_package_descriptor`] for each version, in order.
pub async fn get_package_descriptors<C>(
    conn: &C,
    versions: &[package_version::Model],
) -> PackageResult<Vec<PackageDescriptor>>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut descriptors = Vec::with_capacity(versions.len());
    for version in versions {
        descriptors.push(get_package_descriptor(conn, version).await?);
    }
    Ok(descriptors)
}
