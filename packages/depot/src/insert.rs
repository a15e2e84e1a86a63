use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, IntoActiveModel,
    Select, SqlErr, TransactionSession, TransactionTrait,
};

/// Outcome of [`get_or_insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted<M> {
    /// This call stored the row.
    Created(M),
    /// A row with the same natural key was already there, possibly written by
    /// a concurrent caller that won the race.
    Existing(M),
}

impl<M> Inserted<M> {
    pub fn was_created(&self) -> bool {
        matches!(self, Inserted::Created(_))
    }

    pub fn into_inner(self) -> M {
        match self {
            Inserted::Created(m) | Inserted::Existing(m) => m,
        }
    }
}

/// Return the row selected by `by_key`, inserting `model` if there is none.
///
/// `by_key` must select the row by the same natural key a unique index
/// enforces for `model`.
pub async fn get_or_insert<C, E, A>(
    conn: &C,
    by_key: Select<E>,
    model: A,
) -> Result<Inserted<E::Model>, DbErr>
where
    C: ConnectionTrait + TransactionTrait,
    E: EntityTrait,
    E::Model: IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    if let Some(existing) = by_key.clone().one(conn).await? {
        return Ok(Inserted::Existing(existing));
    }
    insert_or_fetch(conn, by_key, model).await
}

/// Insert `model` without looking first; on a unique violation read back the
/// row selected by `by_key`.
///
/// The insert runs in a nested transaction so that a unique violation rolls
/// back only the savepoint and leaves any transaction held by the caller
/// usable.
pub async fn insert_or_fetch<C, E, A>(
    conn: &C,
    by_key: Select<E>,
    model: A,
) -> Result<Inserted<E::Model>, DbErr>
where
    C: ConnectionTrait + TransactionTrait,
    E: EntityTrait,
    E::Model: IntoActiveModel<A>,
    A: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    let txn = conn.begin().await?;
    match model.insert(&txn).await {
        Ok(created) => {
            txn.commit().await?;
            Ok(Inserted::Created(created))
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            txn.rollback().await?;
            by_key.one(conn).await?.map(Inserted::Existing).ok_or_else(|| {
                DbErr::Custom("UniqueConstraintViolation but existing row not found".to_string())
            })
        }
        Err(e) => Err(e),
    }
}
