use crate::error::RepositoryError;
use crate::models::{Account, AccountRole};
use rust_decimal::Decimal;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, name, email, password_hash, role, balance, created_at, updated_at";

/// Column edits for `UserRepository::update`
#[derive(Debug, Default, Clone, Copy)]
pub struct AccountChanges<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub password_hash: Option<&'a str>,
    pub role: Option<AccountRole>,
    pub balance: Option<Decimal>,
}

/// Repository for account data access
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account. A taken email surfaces as `RepositoryError::Duplicate`.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: AccountRole,
        balance: Decimal,
    ) -> Result<Account, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, balance)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(balance)
        .fetch_one(&self.pool)
        .await?;

        Ok(account)
    }

    /// Find an account by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find an account by its (normalised) email
    pub async fn find_by_email(&self, email: &str) -> SqlxResult<Option<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Load several accounts at once
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> SqlxResult<Vec<Account>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
    }

    /// List every account, oldest first
    pub async fn list_all(&self) -> SqlxResult<Vec<Account>> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// Apply an edit in one statement; `None` leaves a column untouched
    pub async fn update(
        &self,
        id: Uuid,
        changes: &AccountChanges<'_>,
    ) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                balance = COALESCE($6, balance),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.balance)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Delete an account (cascades to stakes, memberships and owned groups)
    pub async fn delete(&self, id: Uuid) -> SqlxResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    /// Current balance of an account
    pub async fn balance_of(&self, id: Uuid) -> SqlxResult<Option<Decimal>> {
        sqlx::query_scalar::<_, Decimal>("SELECT balance FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }
}
