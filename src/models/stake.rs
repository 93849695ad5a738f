use super::WagerOffer;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Personal ledger entry: an account's stake on a catalog offer
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stake {
    pub id: Uuid,
    pub user_id: Uuid,
    pub offer_id: Uuid,
    pub amount: Decimal,
    pub finishing_position: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Stake joined with the offer it references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeWithOffer {
    #[serde(flatten)]
    pub stake: Stake,
    pub offer: WagerOffer,
}
