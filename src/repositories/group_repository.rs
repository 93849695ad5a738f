use crate::error::RepositoryError;
use crate::models::Group;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const GROUP_COLUMNS: &str = "id, name, invite_code, owner_id, created_at, updated_at";

/// Repository for group data access
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    /// Create a new GroupRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a group together with its owner's membership.
    ///
    /// An invite code collision surfaces as `RepositoryError::Duplicate`.
    pub async fn create_with_owner(
        &self,
        name: &str,
        invite_code: &str,
        owner_id: Uuid,
    ) -> Result<Group, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let group = sqlx::query_as::<_, Group>(&format!(
            r#"
            INSERT INTO groups (name, invite_code, owner_id)
            VALUES ($1, $2, $3)
            RETURNING {GROUP_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(invite_code)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
            .bind(group.id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(group)
    }

    /// Find a group by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Group>> {
        sqlx::query_as::<_, Group>(&format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find a group by invite code
    pub async fn find_by_code(&self, code: &str) -> SqlxResult<Option<Group>> {
        sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups WHERE invite_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
    }

    /// All groups an account belongs to
    pub async fn find_for_member(&self, user_id: Uuid) -> SqlxResult<Vec<Group>> {
        sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.invite_code, g.owner_id, g.created_at, g.updated_at
            FROM groups g
            JOIN group_members m ON m.group_id = g.id
            WHERE m.user_id = $1
            ORDER BY m.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// List every group
    pub async fn list_all(&self) -> SqlxResult<Vec<Group>> {
        sqlx::query_as::<_, Group>(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// Delete a group; memberships go with it through ON DELETE CASCADE
    pub async fn delete(&self, id: Uuid) -> SqlxResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }
}
