use crate::error::RepositoryError;
use crate::models::WagerOffer;
use rust_decimal::Decimal;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

const OFFER_COLUMNS: &str = "id, race_id, runner_id, odds, target_position, created_at, updated_at";

/// Repository for the wager catalog
pub struct WagerOfferRepository {
    pool: PgPool,
}

impl WagerOfferRepository {
    /// Create a new WagerOfferRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new offer
    pub async fn create(
        &self,
        race_id: i64,
        runner_id: i64,
        odds: Decimal,
        target_position: Option<i32>,
    ) -> Result<WagerOffer, RepositoryError> {
        let offer = sqlx::query_as::<_, WagerOffer>(&format!(
            r#"
            INSERT INTO wager_offers (race_id, runner_id, odds, target_position)
            VALUES ($1, $2, $3, $4)
            RETURNING {OFFER_COLUMNS}
            "#
        ))
        .bind(race_id)
        .bind(runner_id)
        .bind(odds)
        .bind(target_position)
        .fetch_one(&self.pool)
        .await?;

        Ok(offer)
    }

    /// Find an offer by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<WagerOffer>> {
        sqlx::query_as::<_, WagerOffer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM wager_offers WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Load several offers at once
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> SqlxResult<Vec<WagerOffer>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, WagerOffer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM wager_offers WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
    }

    /// List the whole catalog
    pub async fn list_all(&self) -> SqlxResult<Vec<WagerOffer>> {
        sqlx::query_as::<_, WagerOffer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM wager_offers ORDER BY race_id ASC, runner_id ASC"
        ))
        .fetch_all(&self.pool)
        .await
    }

    /// All offers on a race
    pub async fn find_by_race(&self, race_id: i64) -> SqlxResult<Vec<WagerOffer>> {
        sqlx::query_as::<_, WagerOffer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM wager_offers WHERE race_id = $1 ORDER BY runner_id ASC"
        ))
        .bind(race_id)
        .fetch_all(&self.pool)
        .await
    }

    /// All offers on a runner
    pub async fn find_by_runner(&self, runner_id: i64) -> SqlxResult<Vec<WagerOffer>> {
        sqlx::query_as::<_, WagerOffer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM wager_offers WHERE runner_id = $1 ORDER BY race_id ASC"
        ))
        .bind(runner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Whether an offer already exists for the (race, runner) pair
    pub async fn exists_for(&self, race_id: i64, runner_id: i64) -> SqlxResult<bool> {
        let result = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT 1
            FROM wager_offers
            WHERE race_id = $1 AND runner_id = $2
            LIMIT 1
            "#,
        )
        .bind(race_id)
        .bind(runner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result.is_some())
    }

    /// Edit odds and/or target position
    pub async fn update_terms(
        &self,
        id: Uuid,
        odds: Option<Decimal>,
        target_position: Option<i32>,
    ) -> Result<Option<WagerOffer>, RepositoryError> {
        let offer = sqlx::query_as::<_, WagerOffer>(&format!(
            r#"
            UPDATE wager_offers
            SET odds = COALESCE($2, odds),
                target_position = COALESCE($3, target_position),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {OFFER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(odds)
        .bind(target_position)
        .fetch_optional(&self.pool)
        .await?;

        Ok(offer)
    }

    /// Delete an offer, refunding every stake placed on it.
    ///
    /// Returns how many accounts were credited, or `None` when the offer did not exist.
    pub async fn delete_with_refunds(&self, id: Uuid) -> Result<Option<u64>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let refunded = sqlx::query(
            r#"
            UPDATE users u
            SET balance = u.balance + s.total, updated_at = NOW()
            FROM (
                SELECT user_id, SUM(amount) AS total
                FROM stakes
                WHERE offer_id = $1
                GROUP BY user_id
            ) s
            WHERE u.id = s.user_id
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Stakes go with the offer through ON DELETE CASCADE
        let deleted = sqlx::query("DELETE FROM wager_offers WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;

        Ok(Some(refunded))
    }
}
