use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog offer: fixed odds on one runner of one external race
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WagerOffer {
    pub id: Uuid,
    pub race_id: i64,
    pub runner_id: i64,
    pub odds: Decimal, // NUMERIC(10, 2), >= 1
    pub target_position: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl WagerOffer {
    /// Gain reported to the bettor for a stake of `amount`
    pub fn potential_payout(&self, amount: Decimal) -> Decimal {
        amount * self.odds
    }

    /// Validate the editable fields of an offer
    pub fn validate_terms(odds: Decimal, target_position: Option<i32>) -> Result<(), String> {
        if odds < Decimal::ONE {
            return Err("Odds must be at least 1".to_string());
        }
        if let Some(position) = target_position {
            if position < 1 {
                return Err("Target position must be at least 1".to_string());
            }
        }
        Ok(())
    }
}
