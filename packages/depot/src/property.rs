use common::PropertyType;
use sea_orm::*;

use crate::entity::package_property;
use crate::error::PackageResult;

/// Name/value pairs attached to packages, versions and files.
///
/// Names are multi-valued: nothing stops several rows from sharing
/// `(ref_type, ref_id, name)`. Callers wanting a single value use
/// [`PropertyStore::insert_or_update`].
pub struct PropertyStore<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PropertyStore<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Append a property.
    pub async fn insert(
        &self,
        ref_type: PropertyType,
        ref_id: i32,
        name: &str,
        value: &str,
    ) -> PackageResult<package_property::Model> {
        let model = package_property::ActiveModel {
            ref_type: Set(ref_type),
            ref_id: Set(ref_id),
            name: Set(name.to_string()),
            value: Set(value.to_string()),
            ..Default::default()
        };
        Ok(model.insert(self.conn).await?)
    }

    pub async fn get_properties(
        &self,
        ref_type: PropertyType,
        ref_id: i32,
    ) -> PackageResult<Vec<package_property::Model>> {
        Ok(Self::by_ref(ref_type, ref_id)
            .order_by_asc(package_property::Column::Id)
            .all(self.conn)
            .await?)
    }

    pub async fn get_properties_by_name(
        &self,
        ref_type: PropertyType,
        ref_id: i32,
        name: &str,
    ) -> PackageResult<Vec<package_property::Model>> {
        Ok(Self::by_ref(ref_type, ref_id)
            .filter(package_property::Column::Name.eq(name))
            .order_by_asc(package_property::Column::Id)
            .all(self.conn)
            .await?)
    }

    /// Overwrite the value of an existing row.
    pub async fn update(&self, property: &package_property::Model) -> PackageResult<()> {
        package_property::Entity::update_many()
            .col_expr(
                package_property::Column::Value,
                sea_orm::sea_query::Expr::value(property.value.clone()),
            )
            .filter(package_property::Column::Id.eq(property.id))
            .exec(self.conn)
            .await?;
        Ok(())
    }

    /// Set `value` on every row named `name`, inserting one row if there were none.
    pub async fn insert_or_update(
        &self,
        ref_type: PropertyType,
        ref_id: i32,
        name: &str,
        value: &str,
    ) -> PackageResult<()> {
        let res = package_property::Entity::update_many()
            .col_expr(
                package_property::Column::Value,
                sea_orm::sea_query::Expr::value(value),
            )
            .filter(package_property::Column::RefType.eq(ref_type))
            .filter(package_property::Column::RefId.eq(ref_id))
            .filter(package_property::Column::Name.eq(name))
            .exec(self.conn)
            .await?;

        if res.rows_affected == 0 {
            self.insert(ref_type, ref_id, name, value).await?;
        }
        Ok(())
    }

    pub async fn delete_all(&self, ref_type: PropertyType, ref_id: i32) -> PackageResult<u64> {
        self.delete_all_for(ref_type, &[ref_id]).await
    }

    /// Delete every property of several rows of the same kind.
    pub async fn delete_all_for(
        &self,
        ref_type: PropertyType,
        ref_ids: &[i32],
    ) -> PackageResult<u64> {
        if ref_ids.is_empty() {
            return Ok(0);
        }
        let res = package_property::Entity::delete_many()
            .filter(package_property::Column::RefType.eq(ref_type))
            .filter(package_property::Column::RefId.is_in(ref_ids.iter().copied()))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    pub async fn delete_by_id(&self, id: i32) -> PackageResult<()> {
        package_property::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?;
        Ok(())
    }

    pub async fn delete_by_name(
        &self,
        ref_type: PropertyType,
        ref_id: i32,
        name: &str,
    ) -> PackageResult<u64> {
        let res = package_property::Entity::delete_many()
            .filter(package_property::Column::RefType.eq(ref_type))
            .filter(package_property::Column::RefId.eq(ref_id))
            .filter(package_property::Column::Name.eq(name))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    /// Delete rows with this exact name and value on any of `ref_ids`.
    ///
    /// Used to move a pointer-style property such as a tag from one row to another.
    pub async fn delete_by_name_and_value(
        &self,
        ref_type: PropertyType,
        ref_ids: &[i32],
        name: &str,
        value: &str,
    ) -> PackageResult<u64> {
        if ref_ids.is_empty() {
            return Ok(0);
        }
        let res = package_property::Entity::delete_many()
            .filter(package_property::Column::RefType.eq(ref_type))
            .filter(package_property::Column::RefId.is_in(ref_ids.iter().copied()))
            .filter(package_property::Column::Name.eq(name))
            .filter(package_property::Column::Value.eq(value))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    /// Whether any row of `ref_type` carries this name and value.
    pub async fn has_property_value(
        &self,
        ref_type: PropertyType,
        name: &str,
        value: &str,
    ) -> PackageResult<bool> {
        let count = package_property::Entity::find()
            .filter(package_property::Column::RefType.eq(ref_type))
            .filter(package_property::Column::Name.eq(name))
            .filter(package_property::Column::Value.eq(value))
            .count(self.conn)
            .await?;
        Ok(count > 0)
    }

    fn by_ref(ref_type: PropertyType, ref_id: i32) -> Select<package_property::Entity> {
        package_property::Entity::find()
            .filter(package_property::Column::RefType.eq(ref_type))
            .filter(package_property::Column::RefId.eq(ref_id))
    }
}
