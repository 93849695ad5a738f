use crate::error::{AppError, AppResult};
use crate::models::WagerOffer;
use crate::repositories::WagerOfferRepository;
use crate::services::race_gateway::{validate_race_and_runner, Lookup, RaceGatewayHandle};
use crate::services::wager_window;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Range of generated odds, inclusive
pub const GENERATED_ODDS: (i64, i64) = (1, 20);
/// Range of generated target positions, inclusive
pub const GENERATED_POSITIONS: (i32, i32) = (1, 3);

/// Summary of a bulk generation run
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub race_id: i64,
    pub race_name: String,
    pub days_remaining: i64,
    pub total_runners: usize,
    pub created: usize,
    pub skipped: usize,
    pub offers: Vec<WagerOffer>,
}

/// Service for the canonical wager catalog
pub struct CatalogService {
    offer_repo: Arc<WagerOfferRepository>,
    gateway: RaceGatewayHandle,
    min_lead_days: i64,
}

impl CatalogService {
    pub fn new(
        offer_repo: Arc<WagerOfferRepository>,
        gateway: RaceGatewayHandle,
        min_lead_days: i64,
    ) -> Self {
        Self {
            offer_repo,
            gateway,
            min_lead_days,
        }
    }

    pub async fn list_offers(&self) -> AppResult<Vec<WagerOffer>> {
        Ok(self.offer_repo.list_all().await?)
    }

    pub async fn get_offer(&self, id: Uuid) -> AppResult<WagerOffer> {
        self.offer_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bet not found".into()))
    }

    pub async fn offers_by_race(&self, race_id: i64) -> AppResult<Vec<WagerOffer>> {
        Ok(self.offer_repo.find_by_race(race_id).await?)
    }

    pub async fn offers_by_runner(&self, runner_id: i64) -> AppResult<Vec<WagerOffer>> {
        Ok(self.offer_repo.find_by_runner(runner_id).await?)
    }

    /// Create an offer after both the race and the runner resolve upstream
    pub async fn create_offer(
        &self,
        race_id: i64,
        runner_id: i64,
        odds: Decimal,
        target_position: Option<i32>,
    ) -> AppResult<WagerOffer> {
        WagerOffer::validate_terms(odds, target_position).map_err(AppError::Validation)?;

        let validation = validate_race_and_runner(self.gateway.as_ref(), race_id, runner_id).await;
        if !validation.is_valid() {
            warn!(
                "Rejected offer for race {} runner {}: {:?}",
                race_id, runner_id, validation.errors
            );
            return Err(AppError::Validation(validation.errors.join("; ")));
        }

        let offer = self
            .offer_repo
            .create(race_id, runner_id, odds, target_position)
            .await?;

        info!(
            "Created offer {} (race {}, runner {}, odds {})",
            offer.id, race_id, runner_id, odds
        );
        Ok(offer)
    }

    pub async fn update_offer(
        &self,
        id: Uuid,
        odds: Option<Decimal>,
        target_position: Option<i32>,
    ) -> AppResult<WagerOffer> {
        WagerOffer::validate_terms(odds.unwrap_or(Decimal::ONE), target_position)
            .map_err(AppError::Validation)?;

        let offer = self
            .offer_repo
            .update_terms(id, odds, target_position)
            .await?
            .ok_or_else(|| AppError::NotFound("Bet not found".into()))?;

        info!("Updated offer {}", id);
        Ok(offer)
    }

    /// Delete an offer; stakes on it are refunded to their owners
    pub async fn delete_offer(&self, id: Uuid) -> AppResult<u64> {
        let refunded = self
            .offer_repo
            .delete_with_refunds(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bet not found".into()))?;

        info!("Deleted offer {} ({} account(s) refunded)", id, refunded);
        Ok(refunded)
    }

    /// Create one offer per registered runner of a race.
    ///
    /// Runners that already have an offer are skipped, so re-running is a
    /// no-op once the catalog is complete.
    pub async fn generate_offers_for_race(&self, race_id: i64) -> AppResult<GenerationReport> {
        let race = match self.gateway.race(race_id).await {
            Lookup::Found(race) => race,
            Lookup::Missing | Lookup::Unavailable(_) => {
                return Err(AppError::NotFound(format!("Race {} not found", race_id)));
            }
        };

        let days_remaining =
            wager_window::ensure_lead_time(race.start_date, Utc::now(), self.min_lead_days)
                .map_err(|violation| {
                    warn!("Offer generation refused for race {}: {}", race_id, violation);
                    AppError::WagerWindow(violation)
                })?;

        let runners = self.gateway.race_runners(race_id).await.found().unwrap_or_default();
        if runners.is_empty() {
            return Err(AppError::Validation(format!(
                "No runners registered for race {}",
                race_id
            )));
        }

        let mut offers = Vec::new();
        for runner in &runners {
            if self.offer_repo.exists_for(race_id, runner.id).await? {
                continue;
            }

            let (odds, target_position) = random_terms();
            let offer = self
                .offer_repo
                .create(race_id, runner.id, odds, Some(target_position))
                .await?;
            offers.push(offer);
        }

        let report = GenerationReport {
            race_id,
            race_name: race.name,
            days_remaining,
            total_runners: runners.len(),
            created: offers.len(),
            skipped: runners.len() - offers.len(),
            offers,
        };

        info!(
            "Generated {} offer(s) for race {} ({} runners, {} skipped)",
            report.created, race_id, report.total_runners, report.skipped
        );
        Ok(report)
    }
}

/// Uniform integer odds and target position for a generated offer
pub fn random_terms() -> (Decimal, i32) {
    let mut rng = rand::thread_rng();
    let odds = rng.gen_range(GENERATED_ODDS.0..=GENERATED_ODDS.1);
    let position = rng.gen_range(GENERATED_POSITIONS.0..=GENERATED_POSITIONS.1);
    (Decimal::from(odds), position)
}
