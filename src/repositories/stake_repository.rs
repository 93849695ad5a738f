//! Repository for personal stakes and the balance movements tied to them

use crate::error::RepositoryError;
use crate::models::{Stake, WagerOffer};
use rust_decimal::Decimal;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const STAKE_COLUMNS: &str =
    "id, user_id, offer_id, amount, finishing_position, created_at, updated_at";

/// Outcome of a balance-moving stake operation
#[derive(Debug, Clone)]
pub struct StakeMovement {
    pub stake: Stake,
    pub balance_after: Decimal,
}

pub struct StakeRepository {
    pool: PgPool,
}

impl StakeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Balance-moving operations
    // =========================================================================

    /// Debit `amount` from the account and record the stake, atomically.
    ///
    /// The account row is locked for the whole transaction, so concurrent
    /// placements by the same account serialize. Fails with
    /// `Duplicate` when the account already holds a stake on the offer's race
    /// and with `InsufficientBalance` when the balance does not cover the amount.
    pub async fn place(
        &self,
        user_id: Uuid,
        offer: &WagerOffer,
        amount: Decimal,
    ) -> Result<StakeMovement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Account not found".to_string()))?;

        let existing = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT s.id
            FROM stakes s
            JOIN wager_offers o ON o.id = s.offer_id
            WHERE s.user_id = $1 AND o.race_id = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(offer.race_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing_id) = existing {
            return Err(RepositoryError::Duplicate(format!(
                "a stake on race {} already exists ({})",
                offer.race_id, existing_id
            )));
        }

        if balance < amount {
            return Err(RepositoryError::InsufficientBalance {
                available: balance,
                required: amount,
            });
        }

        let balance_after = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE users
            SET balance = balance - $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        let stake = sqlx::query_as::<_, Stake>(&format!(
            r#"
            INSERT INTO stakes (user_id, offer_id, amount)
            VALUES ($1, $2, $3)
            RETURNING {STAKE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(offer.id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StakeMovement {
            stake,
            balance_after,
        })
    }

    /// Delete the owner's stake and credit its amount back, atomically
    pub async fn cancel(
        &self,
        stake_id: Uuid,
        user_id: Uuid,
    ) -> Result<StakeMovement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let stake = sqlx::query_as::<_, Stake>(&format!(
            r#"
            DELETE FROM stakes
            WHERE id = $1 AND user_id = $2
            RETURNING {STAKE_COLUMNS}
            "#
        ))
        .bind(stake_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Stake not found".to_string()))?;

        let balance_after = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE users
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(stake.amount)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Account not found".to_string()))?;

        tx.commit().await?;

        Ok(StakeMovement {
            stake,
            balance_after,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Find a stake by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Stake>> {
        sqlx::query_as::<_, Stake>(&format!("SELECT {STAKE_COLUMNS} FROM stakes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// All stakes of an account, newest first
    pub async fn find_by_user(&self, user_id: Uuid) -> SqlxResult<Vec<Stake>> {
        sqlx::query_as::<_, Stake>(&format!(
            "SELECT {STAKE_COLUMNS} FROM stakes WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    /// All stakes of several accounts, newest first
    pub async fn find_by_users(&self, user_ids: &[Uuid]) -> SqlxResult<Vec<Stake>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, Stake>(&format!(
            "SELECT {STAKE_COLUMNS} FROM stakes WHERE user_id = ANY($1) ORDER BY created_at DESC"
        ))
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
    }

    /// All stakes placed on an offer, newest first
    pub async fn find_by_offer(&self, offer_id: Uuid) -> SqlxResult<Vec<Stake>> {
        sqlx::query_as::<_, Stake>(&format!(
            "SELECT {STAKE_COLUMNS} FROM stakes WHERE offer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(offer_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Every stake, newest first
    pub async fn list_all(&self) -> SqlxResult<Vec<Stake>> {
        sqlx::query_as::<_, Stake>(&format!(
            "SELECT {STAKE_COLUMNS} FROM stakes ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
    }
}
