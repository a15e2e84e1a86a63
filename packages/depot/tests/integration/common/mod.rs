use std::sync::Arc;

use chrono::Utc;
use common::storage::FilesystemContentStore;
use common::{AccessMode, PackageType, Visibility};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::json;
use tempfile::TempDir;

use depot::config::{DatabaseConfig, LimitsConfig};
use depot::database::init_db;
use depot::entity::{package_file, package_version, team, team_user, user};
use depot::metadata::Metadata;
use depot::service::{
    Doer, PackageBlobData, PackageCreationInfo, PackageFileCreationInfo, PackageInfo,
    PackageService,
};

/// A fresh in-memory database with a content store in a temporary directory.
pub struct TestStore {
    pub db: DatabaseConnection,
    pub service: PackageService,
    _content_dir: TempDir,
}

impl TestStore {
    pub async fn new() -> Self {
        Self::with_limits(LimitsConfig::default()).await
    }

    pub async fn with_limits(limits: LimitsConfig) -> Self {
        // One connection that never expires, or the in-memory database is lost.
        let config = DatabaseConfig {
            max_connections: 1,
            min_connections: 1,
            ..DatabaseConfig::new("sqlite::memory:")
        };
        let db = init_db(&config)
            .await
            .expect("Failed to initialize test database");

        let content_dir = tempfile::tempdir().expect("Failed to create content dir");
        let content = FilesystemContentStore::new(content_dir.path().to_path_buf(), 1024 * 1024)
            .await
            .expect("Failed to create content store");

        let service = PackageService::new(db.clone(), Arc::new(content), limits);
        Self {
            db,
            service,
            _content_dir: content_dir,
        }
    }

    pub async fn create_user(&self, name: &str) -> user::Model {
        self.insert_user(name, false, Visibility::Public).await
    }

    pub async fn create_admin(&self, name: &str) -> user::Model {
        self.insert_user(name, true, Visibility::Public).await
    }

    pub async fn create_org(&self, name: &str, visibility: Visibility) -> user::Model {
        user::ActiveModel {
            name: Set(name.to_string()),
            lower_name: Set(name.to_lowercase()),
            is_admin: Set(false),
            is_organization: Set(true),
            visibility: Set(visibility),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to create organization")
    }

    pub async fn insert_user(
        &self,
        name: &str,
        is_admin: bool,
        visibility: Visibility,
    ) -> user::Model {
        user::ActiveModel {
            name: Set(name.to_string()),
            lower_name: Set(name.to_lowercase()),
            is_admin: Set(is_admin),
            is_organization: Set(false),
            visibility: Set(visibility),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to create user")
    }

    /// Add `member` to a new team of `org` with the given package access.
    pub async fn add_team_member(
        &self,
        org: &user::Model,
        member: &user::Model,
        access: AccessMode,
    ) {
        let team = team::ActiveModel {
            org_id: Set(org.id),
            name: Set(format!("team-{}", member.lower_name)),
            package_access: Set(access),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to create team");

        team_user::ActiveModel {
            team_id: Set(team.id),
            user_id: Set(member.id),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .expect("Failed to add team member");
    }

    /// Create `name@version` owned by `owner` with one lead file.
    pub async fn publish(
        &self,
        owner: &user::Model,
        name: &str,
        version: &str,
        filename: &str,
        content: &[u8],
    ) -> (package_version::Model, package_file::Model) {
        let pci = creation_info(owner, PackageType::Generic, name, version);
        let mut pfci = file_info(owner, filename, content);
        pfci.is_lead = true;
        self.service
            .create_package_or_add_file_to_existing(&pci, pfci)
            .await
            .expect("Failed to publish package")
    }
}

pub fn package_info(
    owner: &user::Model,
    package_type: PackageType,
    name: &str,
    version: &str,
) -> PackageInfo {
    PackageInfo {
        owner_id: owner.id,
        package_type,
        name: name.to_string(),
        version: version.to_string(),
    }
}

pub fn creation_info(
    owner: &user::Model,
    package_type: PackageType,
    name: &str,
    version: &str,
) -> PackageCreationInfo {
    PackageCreationInfo::new(
        package_info(owner, package_type, name, version),
        Doer::from(owner),
        Metadata::new(package_type, json!({ "description": format!("{name} package") })),
    )
}

pub fn file_info(
    creator: &user::Model,
    filename: &str,
    content: &[u8],
) -> PackageFileCreationInfo {
    PackageFileCreationInfo::new(
        filename,
        Doer::from(creator),
        PackageBlobData::from_bytes(content.to_vec()),
    )
}
