use common::Visibility;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};

use crate::entity::{team, team_user, user};

/// The account a read is performed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Principal {
    /// `None` for anonymous readers.
    pub user_id: Option<i32>,
    pub is_admin: bool,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin: false,
        }
    }

    pub fn admin(user_id: i32) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin: true,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Whether `principal` may read packages owned by `owner`.
pub async fn can_read_owner<C: ConnectionTrait>(
    conn: &C,
    owner: &user::Model,
    principal: &Principal,
) -> Result<bool, DbErr> {
    if principal.is_admin || principal.user_id == Some(owner.id) {
        return Ok(true);
    }

    match owner.visibility {
        Visibility::Public => return Ok(true),
        Visibility::Limited if principal.is_signed_in() => return Ok(true),
        _ => {}
    }

    let Some(user_id) = principal.user_id else {
        return Ok(false);
    };
    if !owner.is_organization {
        return Ok(false);
    }

    let team_ids: Vec<i32> = team_user::Entity::find()
        .select_only()
        .column(team_user::Column::TeamId)
        .filter(team_user::Column::UserId.eq(user_id))
        .into_tuple()
        .all(conn)
        .await?;
    if team_ids.is_empty() {
        return Ok(false);
    }

    let teams = team::Entity::find()
        .filter(team::Column::OrgId.eq(owner.id))
        .filter(team::Column::Id.is_in(team_ids))
        .all(conn)
        .await?;

    Ok(teams.iter().any(|t| t.package_access.can_read()))
}
