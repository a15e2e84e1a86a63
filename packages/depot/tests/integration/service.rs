use std::collections::HashMap;

use common::storage::{ContentHash, HashSums};
use common::{PackageType, PropertyType};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use tokio::io::AsyncReadExt;

use depot::blob::BlobStore;
use depot::catalog::PackageCatalog;
use depot::config::LimitsConfig;
use depot::entity::{package, package_blob, package_file};
use depot::error::{PackageError, QuotaKind};
use depot::file::FileIndex;
use depot::metadata::Metadata;
use depot::property::PropertyStore;
use depot::service::VERSION_TAG_PROPERTY;

use crate::common::{TestStore, creation_info, file_info, package_info};

async fn content_exists(store: &TestStore, sha256: &str) -> bool {
    store
        .service
        .content()
        .exists(&ContentHash::from_hex(sha256).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn identical_content_is_stored_once() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (_, f1) = store.publish(&owner, "app", "1.0", "app-1.0.tgz", b"same").await;
    let (_, f2) = store.publish(&owner, "app", "1.1", "app-1.1.tgz", b"same").await;

    assert_eq!(f1.blob_id, f2.blob_id);
    assert_eq!(package_blob::Entity::find().count(&store.db).await.unwrap(), 1);
    assert!(content_exists(&store, &HashSums::compute(b"same").sha256_hex()).await);
}

#[tokio::test]
async fn creating_an_existing_version_fails() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let pci = creation_info(&owner, PackageType::Generic, "app", "1.0");
    store
        .service
        .create_package_and_add_file(&pci, file_info(&owner, "a.bin", b"a"))
        .await
        .unwrap();

    let result = store
        .service
        .create_package_and_add_file(&pci, file_info(&owner, "b.bin", b"b"))
        .await;
    assert!(matches!(result, Err(PackageError::DuplicatePackageVersion(_))));

    // The rolled back upload left neither a blob row nor content behind.
    let b = HashSums::compute(b"b");
    assert!(matches!(
        BlobStore::new(&store.db).get_by_sha256(&b.sha256_hex()).await,
        Err(PackageError::PackageBlobNotExist)
    ));
    assert!(!content_exists(&store, &b.sha256_hex()).await);

    // The lenient variant adds the file instead.
    let (_, file) = store
        .service
        .create_package_or_add_file_to_existing(&pci, file_info(&owner, "b.bin", b"b"))
        .await
        .unwrap();
    assert_eq!(file.name, "b.bin");
}

#[tokio::test]
async fn metadata_must_match_package_type() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let mut pci = creation_info(&owner, PackageType::Npm, "app", "1.0");
    pci.metadata = Metadata::new(PackageType::Maven, json!({}));

    let result = store
        .service
        .create_package_and_add_file(&pci, file_info(&owner, "a.tgz", b"a"))
        .await;
    assert!(matches!(result, Err(PackageError::InvalidArgument(_))));
    assert_eq!(package::Entity::find().count(&store.db).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_file_insert_discards_new_content() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (version, _) = store.publish(&owner, "app", "1.0", "app.tgz", b"lead").await;

    let mut second_lead = file_info(&owner, "other.tgz", b"fresh content");
    second_lead.is_lead = true;
    let info = package_info(&owner, PackageType::Generic, "app", "1.0");
    let result = store
        .service
        .add_file_to_existing_package(&info, second_lead)
        .await;
    assert!(matches!(result, Err(PackageError::InvalidArgument(_))));

    let fresh = HashSums::compute(b"fresh content").sha256_hex();
    assert!(!content_exists(&store, &fresh).await);
    assert!(BlobStore::new(&store.db).get_by_sha256(&fresh).await.is_err());
    assert_eq!(
        FileIndex::new(&store.db)
            .get_files_by_version_id(version.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn overwrite_replaces_file_with_new_content() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (version, first) = store.publish(&owner, "app", "1.0", "app.tgz", b"v1").await;
    let info = package_info(&owner, PackageType::Generic, "app", "1.0");

    let mut same = file_info(&owner, "app.tgz", b"v1");
    same.overwrite_existing = true;
    let unchanged = store
        .service
        .add_file_to_existing_package(&info, same)
        .await
        .unwrap();
    assert_eq!(unchanged.id, first.id);

    let mut replacement = file_info(&owner, "APP.tgz", b"v2");
    replacement.overwrite_existing = true;
    let replaced = store
        .service
        .add_file_to_existing_package(&info, replacement)
        .await
        .unwrap();
    assert_ne!(replaced.id, first.id);
    assert_ne!(replaced.blob_id, first.blob_id);

    let files = FileIndex::new(&store.db)
        .get_files_by_version_id(version.id)
        .await
        .unwrap();
    assert_eq!(files.len(), 1);

    let mut duplicate = file_info(&owner, "app.tgz", b"v3");
    duplicate.overwrite_existing = false;
    assert!(matches!(
        store.service.add_file_to_existing_package(&info, duplicate).await,
        Err(PackageError::DuplicatePackageFile(_))
    ));
}

#[tokio::test]
async fn adding_to_a_missing_version_fails() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let info = package_info(&owner, PackageType::Generic, "ghost", "1.0");
    assert!(matches!(
        store
            .service
            .add_file_to_existing_package(&info, file_info(&owner, "a", b"a"))
            .await,
        Err(PackageError::PackageVersionNotExist)
    ));
}

#[tokio::test]
async fn removing_the_last_version_removes_the_package() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let mut pci = creation_info(&owner, PackageType::Generic, "app", "1.0");
    pci.package_properties = vec![("homepage".to_string(), "https://example.com".to_string())];
    pci.version_properties = vec![("channel".to_string(), "stable".to_string())];
    let mut pfci = file_info(&owner, "app.tgz", b"content");
    pfci.properties = vec![("arch".to_string(), "any".to_string())];
    let (v1, file) = store
        .service
        .create_package_and_add_file(&pci, pfci)
        .await
        .unwrap();
    let (v2, _) = store.publish(&owner, "app", "2.0", "app-2.tgz", b"two").await;

    store.service.remove_package_version(&v1).await.unwrap();
    let catalog = PackageCatalog::new(&store.db);
    assert!(catalog.get_package_by_id(v1.package_id).await.is_ok());

    let props = PropertyStore::new(&store.db);
    assert!(props.get_properties(PropertyType::Version, v1.id).await.unwrap().is_empty());
    assert!(props.get_properties(PropertyType::File, file.id).await.unwrap().is_empty());
    assert_eq!(
        props.get_properties(PropertyType::Package, v1.package_id).await.unwrap().len(),
        1
    );

    store
        .service
        .remove_package_version_by_name_and_version(&package_info(
            &owner,
            PackageType::Generic,
            "app",
            "2.0",
        ))
        .await
        .unwrap();
    assert!(matches!(
        catalog.get_package_by_id(v2.package_id).await,
        Err(PackageError::PackageNotExist)
    ));
    assert!(props.get_properties(PropertyType::Package, v1.package_id).await.unwrap().is_empty());

    // Blobs stay for the collector.
    assert!(BlobStore::new(&store.db).get_by_id(file.blob_id).await.is_ok());
    assert_eq!(package_file::Entity::find().count(&store.db).await.unwrap(), 0);
}

#[tokio::test]
async fn removing_the_last_file_removes_its_version() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (version, lead) = store.publish(&owner, "app", "1.0", "app.tgz", b"lead").await;
    let extra = store
        .service
        .add_file_to_existing_package(
            &package_info(&owner, PackageType::Generic, "app", "1.0"),
            file_info(&owner, "app.sig", b"sig"),
        )
        .await
        .unwrap();

    store
        .service
        .remove_package_file_and_version_if_unreferenced(&extra)
        .await
        .unwrap();
    let catalog = PackageCatalog::new(&store.db);
    assert!(catalog.get_version_by_id(version.id).await.is_ok());

    store
        .service
        .remove_package_file_and_version_if_unreferenced(&lead)
        .await
        .unwrap();
    assert!(matches!(
        catalog.get_version_by_id(version.id).await,
        Err(PackageError::PackageVersionNotExist)
    ));
    assert!(matches!(
        catalog.get_package_by_id(version.package_id).await,
        Err(PackageError::PackageNotExist)
    ));
}

#[tokio::test]
async fn low_level_version_delete_keeps_the_package() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (version, _) = store.publish(&owner, "app", "1.0", "app.tgz", b"x").await;

    store
        .service
        .delete_package_version_and_references(&version)
        .await
        .unwrap();
    let catalog = PackageCatalog::new(&store.db);
    assert!(catalog.get_package_by_id(version.package_id).await.is_ok());
    assert_eq!(catalog.find_unreferenced_packages().await.unwrap().len(), 1);
}

#[tokio::test]
async fn remove_all_packages_of_an_owner() {
    let store = TestStore::new().await;
    let alice = store.create_user("alice").await;
    let bob = store.create_user("bob").await;
    for i in 0..60 {
        store
            .publish(&alice, "app", &format!("1.0.{i}"), &format!("app-{i}.tgz"), b"x")
            .await;
    }
    store.publish(&alice, "tool", "1.0", "tool.tgz", b"y").await;
    store
        .service
        .get_or_create_internal_package_version(alice.id, PackageType::Debian, "index", "main")
        .await
        .unwrap();
    store.publish(&bob, "app", "1.0", "app.tgz", b"x").await;

    let removed = store.service.remove_all_packages(alice.id).await.unwrap();
    assert_eq!(removed, 62);

    let catalog = PackageCatalog::new(&store.db);
    assert!(!catalog.has_owner_packages(alice.id).await.unwrap());
    assert_eq!(package::Entity::find().count(&store.db).await.unwrap(), 1);
    assert!(catalog.has_owner_packages(bob.id).await.unwrap());
}

#[tokio::test]
async fn downloading_the_lead_file_counts() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (version, lead) = store.publish(&owner, "app", "1.0", "app.tgz", b"payload").await;
    let info = package_info(&owner, PackageType::Generic, "app", "1.0");
    store
        .service
        .add_file_to_existing_package(&info, file_info(&owner, "app.sig", b"sig"))
        .await
        .unwrap();

    let mut reader = store.service.open_file_for_download(&lead).await.unwrap();
    let mut body = Vec::new();
    reader.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"payload");

    let (mut reader, sig) = store
        .service
        .open_file_for_download_by_name(&info, "APP.SIG", "")
        .await
        .unwrap();
    assert!(!sig.is_lead);
    let mut body = Vec::new();
    reader.read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"sig");

    let version = PackageCatalog::new(&store.db)
        .get_version_by_id(version.id)
        .await
        .unwrap();
    assert_eq!(version.download_count, 1);
}

#[tokio::test]
async fn tags_move_between_versions() {
    let store = TestStore::new().await;
    let owner = store.create_user("alice").await;
    let (v1, _) = store.publish(&owner, "app", "1.0", "a1.tgz", b"1").await;
    let (v2, _) = store.publish(&owner, "app", "2.0", "a2.tgz", b"2").await;

    store.service.set_version_tag(&v1, "latest").await.unwrap();
    store.service.set_version_tag(&v1, "stable").await.unwrap();
    assert_eq!(
        store.service.get_tagged_version(v1.package_id, "latest").await.unwrap().id,
        v1.id
    );

    store.service.set_version_tag(&v2, "latest").await.unwrap();
    assert_eq!(
        store.service.get_tagged_version(v1.package_id, "latest").await.unwrap().id,
        v2.id
    );
    assert_eq!(
        store.service.get_tagged_version(v1.package_id, "stable").await.unwrap().id,
        v1.id
    );

    let props = PropertyStore::new(&store.db);
    let v1_tags = props
        .get_properties_by_name(PropertyType::Version, v1.id, VERSION_TAG_PROPERTY)
        .await
        .unwrap();
    assert_eq!(v1_tags.len(), 1);
    assert_eq!(v1_tags[0].value, "stable");

    store.service.delete_version_tag(v1.package_id, "stable").await.unwrap();
    assert!(matches!(
        store.service.get_tagged_version(v1.package_id, "stable").await,
        Err(PackageError::PackageVersionNotExist)
    ));
}

mod quota {
    use super::*;

    async fn limited(limits: LimitsConfig) -> TestStore {
        TestStore::with_limits(limits).await
    }

    #[tokio::test]
    async fn version_count_is_limited() {
        let store = limited(LimitsConfig {
            total_owner_count: 1,
            ..Default::default()
        })
        .await;
        let owner = store.create_user("alice").await;
        store.publish(&owner, "app", "1.0", "a1", b"1").await;

        let pci = creation_info(&owner, PackageType::Generic, "app", "2.0");
        let result = store
            .service
            .create_package_and_add_file(&pci, file_info(&owner, "a2", b"2"))
            .await;
        assert!(matches!(
            result,
            Err(PackageError::QuotaExceeded(QuotaKind::TotalCount))
        ));
        assert!(
            PackageCatalog::new(&store.db)
                .get_version_by_name_and_version(owner.id, PackageType::Generic, "app", "2.0")
                .await
                .is_err()
        );

        // Adding files to an existing version is not a new version.
        store
            .service
            .add_file_to_existing_package(
                &package_info(&owner, PackageType::Generic, "app", "1.0"),
                file_info(&owner, "a1.sig", b"sig"),
            )
            .await
            .unwrap();

        let admin = store.create_admin("root").await;
        let pci = creation_info(&admin, PackageType::Generic, "app", "1.0");
        let mut pci_for_owner = pci.clone();
        pci_for_owner.info.owner_id = owner.id;
        pci_for_owner.info.version = "3.0".to_string();
        store
            .service
            .create_package_and_add_file(&pci_for_owner, file_info(&admin, "a3", b"3"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_size_is_limited_per_type() {
        let store = limited(LimitsConfig {
            type_size: HashMap::from([(PackageType::Npm, 4)]),
            ..Default::default()
        })
        .await;
        let owner = store.create_user("alice").await;

        let pci = creation_info(&owner, PackageType::Npm, "big", "1.0");
        let result = store
            .service
            .create_package_and_add_file(&pci, file_info(&owner, "big.tgz", b"12345"))
            .await;
        assert!(matches!(
            result,
            Err(PackageError::QuotaExceeded(QuotaKind::TypeSize(PackageType::Npm)))
        ));

        let pci = creation_info(&owner, PackageType::Generic, "big", "1.0");
        store
            .service
            .create_package_and_add_file(&pci, file_info(&owner, "big.bin", b"12345"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn total_size_is_limited_per_owner() {
        let store = limited(LimitsConfig {
            total_owner_size: 8,
            ..Default::default()
        })
        .await;
        let alice = store.create_user("alice").await;
        let bob = store.create_user("bob").await;
        store.publish(&alice, "app", "1.0", "a1", b"12345").await;

        let info = package_info(&alice, PackageType::Generic, "app", "1.0");
        let result = store
            .service
            .add_file_to_existing_package(&info, file_info(&alice, "a2", b"6789"))
            .await;
        assert!(matches!(
            result,
            Err(PackageError::QuotaExceeded(QuotaKind::TotalSize))
        ));

        store.publish(&bob, "app", "1.0", "b1", b"12345678").await;
    }
}
