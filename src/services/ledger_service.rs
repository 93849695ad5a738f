use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{Stake, StakeWithOffer, WagerOffer};
use crate::repositories::{StakeRepository, WagerOfferRepository};
use crate::services::race_gateway::{Lookup, RaceGatewayHandle};
use crate::services::wager_window;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A freshly placed stake with its derived payout
#[derive(Debug, Clone, Serialize)]
pub struct PlacedStake {
    #[serde(flatten)]
    pub stake: Stake,
    pub odds: Decimal,
    pub potential_payout: Decimal,
    pub balance: Decimal,
}

/// A cancelled stake and the balance after the refund
#[derive(Debug, Clone, Serialize)]
pub struct CancelledStake {
    pub stake: Stake,
    pub refunded: Decimal,
    pub balance: Decimal,
}

/// Balances and stakes are stored with two decimal places
pub const AMOUNT_SCALE: u32 = 2;

/// Reject stake quantities the ledger cannot store exactly
pub fn validate_amount(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("amount must be greater than 0".into()));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(AppError::Validation(format!(
            "amount must have at most {} decimal places",
            AMOUNT_SCALE
        )));
    }
    Ok(())
}

/// Pick the stake quantity from `amount`, falling back to the legacy `solde` field
pub fn resolve_amount(amount: Option<Decimal>, solde: Option<Decimal>) -> AppResult<Decimal> {
    let amount = amount
        .or(solde)
        .ok_or_else(|| AppError::Validation("amount is required".into()))?;

    validate_amount(amount)?;
    Ok(amount)
}

/// Service for personal stakes and the balance movements they imply
pub struct LedgerService {
    stake_repo: Arc<StakeRepository>,
    offer_repo: Arc<WagerOfferRepository>,
    gateway: RaceGatewayHandle,
}

impl LedgerService {
    pub fn new(
        stake_repo: Arc<StakeRepository>,
        offer_repo: Arc<WagerOfferRepository>,
        gateway: RaceGatewayHandle,
    ) -> Self {
        Self {
            stake_repo,
            offer_repo,
            gateway,
        }
    }

    /// Place a stake on a catalog offer, debiting the account atomically.
    ///
    /// The race must not have started; when the race service cannot resolve
    /// the race the timing check is skipped.
    pub async fn place_stake(
        &self,
        account_id: Uuid,
        offer_id: Uuid,
        amount: Decimal,
    ) -> AppResult<PlacedStake> {
        validate_amount(amount)?;

        let offer = self
            .offer_repo
            .find_by_id(offer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bet not found".into()))?;

        match self.gateway.race(offer.race_id).await {
            Lookup::Found(race) => {
                wager_window::ensure_not_started(race.start_date, Utc::now()).map_err(
                    |violation| {
                        warn!(
                            "Stake by {} refused on race {}: {}",
                            account_id, offer.race_id, violation
                        );
                        AppError::WagerWindow(violation)
                    },
                )?;
            }
            Lookup::Missing | Lookup::Unavailable(_) => {
                warn!(
                    "Race {} unresolved; placing stake without timing check",
                    offer.race_id
                );
            }
        }

        let movement = self
            .stake_repo
            .place(account_id, &offer, amount)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    warn!("Account {} already holds a stake on race {}", account_id, offer.race_id);
                    AppError::BusinessLogic(format!(
                        "You already have a bet on race {}",
                        offer.race_id
                    ))
                }
                other => other.into(),
            })?;

        info!(
            "Account {} staked {} on offer {} (balance now {})",
            account_id, amount, offer.id, movement.balance_after
        );

        Ok(PlacedStake {
            odds: offer.odds,
            potential_payout: offer.potential_payout(amount),
            stake: movement.stake,
            balance: movement.balance_after,
        })
    }

    /// Cancel one of the caller's stakes and refund it in full
    pub async fn cancel_stake(&self, account_id: Uuid, stake_id: Uuid) -> AppResult<CancelledStake> {
        let stake = self
            .stake_repo
            .find_by_id(stake_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stake not found".into()))?;

        if stake.user_id != account_id {
            return Err(AppError::Forbidden(
                "You can only cancel your own bets".into(),
            ));
        }

        let movement = self.stake_repo.cancel(stake_id, account_id).await?;

        info!(
            "Account {} cancelled stake {} (refunded {}, balance now {})",
            account_id, stake_id, movement.stake.amount, movement.balance_after
        );

        Ok(CancelledStake {
            refunded: movement.stake.amount,
            stake: movement.stake,
            balance: movement.balance_after,
        })
    }

    /// The caller's stakes, newest first, each with its offer
    pub async fn my_stakes(&self, account_id: Uuid) -> AppResult<Vec<StakeWithOffer>> {
        let stakes = self.stake_repo.find_by_user(account_id).await?;
        self.attach_offers(stakes).await
    }

    pub async fn all_stakes(&self) -> AppResult<Vec<StakeWithOffer>> {
        let stakes = self.stake_repo.list_all().await?;
        self.attach_offers(stakes).await
    }

    pub async fn stakes_by_account(&self, account_id: Uuid) -> AppResult<Vec<StakeWithOffer>> {
        let stakes = self.stake_repo.find_by_user(account_id).await?;
        self.attach_offers(stakes).await
    }

    pub async fn stakes_by_offer(&self, offer_id: Uuid) -> AppResult<Vec<StakeWithOffer>> {
        let stakes = self.stake_repo.find_by_offer(offer_id).await?;
        self.attach_offers(stakes).await
    }

    pub async fn get_stake(&self, stake_id: Uuid) -> AppResult<StakeWithOffer> {
        let stake = self
            .stake_repo
            .find_by_id(stake_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Stake not found".into()))?;

        self.attach_offers(vec![stake])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Bet not found".into()))
    }

    async fn attach_offers(&self, stakes: Vec<Stake>) -> AppResult<Vec<StakeWithOffer>> {
        let mut offer_ids: Vec<Uuid> = stakes.iter().map(|s| s.offer_id).collect();
        offer_ids.sort();
        offer_ids.dedup();

        let offers: HashMap<Uuid, WagerOffer> = self
            .offer_repo
            .find_by_ids(&offer_ids)
            .await?
            .into_iter()
            .map(|offer| (offer.id, offer))
            .collect();

        // Stakes cascade with their offer, so a miss here is a concurrent delete
        Ok(stakes
            .into_iter()
            .filter_map(|stake| {
                offers
                    .get(&stake.offer_id)
                    .cloned()
                    .map(|offer| StakeWithOffer { stake, offer })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_amount_prefers_amount() {
        let four = Decimal::new(4, 0);
        let seven = Decimal::new(7, 0);
        assert_eq!(resolve_amount(Some(four), Some(seven)).unwrap(), four);
        assert_eq!(resolve_amount(None, Some(seven)).unwrap(), seven);
    }

    #[test]
    fn test_resolve_amount_rejects_missing_and_non_positive() {
        assert!(matches!(resolve_amount(None, None), Err(AppError::Validation(_))));
        assert!(matches!(
            resolve_amount(Some(Decimal::ZERO), None),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            resolve_amount(Some(Decimal::new(-5, 1)), None),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_scale_limited_to_cents() {
        assert!(validate_amount(Decimal::new(125, 2)).is_ok());
        // Trailing zeros do not count against the scale
        assert!(validate_amount(Decimal::new(12500, 4)).is_ok());
        assert!(matches!(
            validate_amount(Decimal::new(5, 3)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            resolve_amount(None, Some(Decimal::new(1005, 3))),
            Err(AppError::Validation(_))
        ));
    }
}
