use crate::error::RepositoryError;
use crate::models::{Account, GroupMember};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const MEMBER_COLUMNS: &str = "id, group_id, user_id, created_at, updated_at";

/// Repository for group member data access
pub struct GroupMemberRepository {
    pool: PgPool,
}

impl GroupMemberRepository {
    /// Create a new GroupMemberRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add a member to a group. A second join surfaces as `RepositoryError::Duplicate`.
    pub async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<GroupMember, RepositoryError> {
        let member = sqlx::query_as::<_, GroupMember>(&format!(
            r#"
            INSERT INTO group_members (group_id, user_id)
            VALUES ($1, $2)
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    /// Remove a member from a group
    pub async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> SqlxResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM group_members
            WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Find all memberships of an account
    pub async fn find_by_user(&self, user_id: Uuid) -> SqlxResult<Vec<GroupMember>> {
        sqlx::query_as::<_, GroupMember>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM group_members WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Memberships of other accounts in any of the given groups
    pub async fn find_peers(
        &self,
        group_ids: &[Uuid],
        exclude_user: Uuid,
    ) -> SqlxResult<Vec<GroupMember>> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, GroupMember>(&format!(
            r#"
            SELECT {MEMBER_COLUMNS}
            FROM group_members
            WHERE group_id = ANY($1) AND user_id <> $2
            "#
        ))
        .bind(group_ids)
        .bind(exclude_user)
        .fetch_all(&self.pool)
        .await
    }

    /// Accounts behind every membership of a group
    pub async fn member_accounts(&self, group_id: Uuid) -> SqlxResult<Vec<Account>> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT u.id, u.name, u.email, u.password_hash, u.role, u.balance,
                   u.created_at, u.updated_at
            FROM group_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Check if an account is a member of a group
    pub async fn is_member(&self, group_id: Uuid, user_id: Uuid) -> SqlxResult<bool> {
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT 1
            FROM group_members
            WHERE group_id = $1 AND user_id = $2
            LIMIT 1
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result.is_some())
    }
}
