use std::time::Duration;

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement,
};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::{package_property, package_version};

/// Connect, register every entity schema, and create auxiliary indexes.
pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.timeout_secs))
        .acquire_timeout(Duration::from_secs(config.timeout_secs))
        .sqlx_logging(config.sqlx_logging);
    if let Some(secs) = config.connection_lifetime_secs {
        opt.idle_timeout(Duration::from_secs(secs))
            .max_lifetime(Duration::from_secs(secs));
    }

    let db = Database::connect(opt).await?;
    register_schema(&db).await?;
    ensure_indexes(&db).await?;

    Ok(db)
}

/// Create or update the tables, foreign keys and unique keys of all entities
/// in [`crate::entity`] on the given connection.
pub async fn register_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.get_schema_registry("depot::entity::*").sync(db).await?;
    Ok(())
}

/// Ensure the composite and partial indexes exist.
///
/// Schema sync only derives single-column and unique indexes from the entities,
/// so these are created by hand. Failures on the lookup indexes are logged,
/// not fatal.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Property lookups always filter by owner row first:
    // SELECT ... FROM package_property WHERE ref_type = ? AND ref_id = ? AND name = ?
    let property_lookup = Index::create()
        .if_not_exists()
        .name("idx_package_property_ref_name")
        .table(package_property::Entity)
        .col(package_property::Column::RefType)
        .col(package_property::Column::RefId)
        .col(package_property::Column::Name)
        .to_owned();
    create_index(db, "idx_package_property_ref_name", &property_lookup).await;

    // Retention sweeps list a package's versions newest first.
    let version_age = Index::create()
        .if_not_exists()
        .name("idx_package_version_package_created")
        .table(package_version::Entity)
        .col(package_version::Column::PackageId)
        .col(package_version::Column::CreatedAt)
        .to_owned();
    create_index(db, "idx_package_version_package_created", &version_age).await;

    // At most one lead file per version. Partial, so it is written by hand and
    // must exist: file inserts rely on it under concurrency.
    db.execute_raw(Statement::from_string(
        db.get_database_backend(),
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_package_file_version_lead \
         ON package_file (version_id) WHERE is_lead",
    ))
    .await?;
    info!("Ensured index idx_package_file_version_lead exists");

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, index: &IndexCreateStatement) {
    let stmt = db.get_database_backend().build(index);
    match db.execute_raw(stmt).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => warn!("Failed to create index {}: {}", name, e),
    }
}
