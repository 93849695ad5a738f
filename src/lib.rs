//! Marathon Bet Backend Library
//!
//! This module exposes the backend components for use by the binary and tests.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod http_service;
pub mod models;
pub mod repositories;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::SessionKeys;
use database::Database;
use repositories::*;
use services::{
    AccountService, CatalogService, FeedService, GroupService, LedgerService, RaceGatewayHandle,
};
use std::sync::Arc;

/// Application state containing all repositories and services
pub struct AppState {
    pub config: AppConfig,
    pub database: Database,
    pub session_keys: SessionKeys,
    pub user_repo: Arc<UserRepository>,
    pub offer_repo: Arc<WagerOfferRepository>,
    pub stake_repo: Arc<StakeRepository>,
    pub group_repo: Arc<GroupRepository>,
    pub group_member_repo: Arc<GroupMemberRepository>,
    pub gateway: RaceGatewayHandle,
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub ledger: Arc<LedgerService>,
    pub groups: Arc<GroupService>,
    pub feed: Arc<FeedService>,
}

impl AppState {
    /// Wire repositories and services over one pool and race gateway
    pub fn new(pool: sqlx::PgPool, config: AppConfig, gateway: RaceGatewayHandle) -> Self {
        let database = Database::new(pool.clone());
        let session_keys = SessionKeys::new(&config.session);

        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let offer_repo = Arc::new(WagerOfferRepository::new(pool.clone()));
        let stake_repo = Arc::new(StakeRepository::new(pool.clone()));
        let group_repo = Arc::new(GroupRepository::new(pool.clone()));
        let group_member_repo = Arc::new(GroupMemberRepository::new(pool));

        let accounts = Arc::new(AccountService::new(
            user_repo.clone(),
            session_keys.clone(),
            config.wager.starting_balance,
        ));
        let catalog = Arc::new(CatalogService::new(
            offer_repo.clone(),
            gateway.clone(),
            config.wager.min_lead_days,
        ));
        let ledger = Arc::new(LedgerService::new(
            stake_repo.clone(),
            offer_repo.clone(),
            gateway.clone(),
        ));
        let groups = Arc::new(GroupService::new(
            group_repo.clone(),
            group_member_repo.clone(),
        ));
        let feed = Arc::new(FeedService::new(
            group_repo.clone(),
            group_member_repo.clone(),
            stake_repo.clone(),
            offer_repo.clone(),
            user_repo.clone(),
            gateway.clone(),
        ));

        Self {
            config,
            database,
            session_keys,
            user_repo,
            offer_repo,
            stake_repo,
            group_repo,
            group_member_repo,
            gateway,
            accounts,
            catalog,
            ledger,
            groups,
            feed,
        }
    }
}
