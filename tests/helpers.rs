#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use marathon_bet::auth::hash_password;
use marathon_bet::config::AppConfig;
use marathon_bet::models::*;
use marathon_bet::repositories::*;
use marathon_bet::services::{Lookup, RaceData, RaceGateway, RaceGatewayHandle, RunnerData};
use marathon_bet::AppState;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory race catalog standing in for the remote race service
#[derive(Default)]
pub struct StubGateway {
    races: Mutex<HashMap<i64, RaceData>>,
    runners: Mutex<HashMap<i64, Vec<i64>>>,
    race_calls: Mutex<usize>,
    unavailable: Mutex<bool>,
}

impl StubGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a race starting at `start` with the given runner ids
    pub fn add_race(&self, id: i64, start: DateTime<Utc>, runner_ids: &[i64]) {
        self.races.lock().unwrap().insert(
            id,
            RaceData {
                id,
                name: format!("Race {}", id),
                start_date: start,
                kilometer: Some(serde_json::json!(42.195)),
            },
        );
        self.runners.lock().unwrap().insert(id, runner_ids.to_vec());
    }

    /// Register a race starting `days` whole days (plus one hour) from now
    pub fn add_race_in_days(&self, id: i64, days: i64, runner_ids: &[i64]) {
        self.add_race(id, Utc::now() + Duration::days(days) + Duration::hours(1), runner_ids);
    }

    /// Make every lookup fail as if the service were down
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn race_calls(&self) -> usize {
        *self.race_calls.lock().unwrap()
    }

    fn is_unavailable(&self) -> bool {
        *self.unavailable.lock().unwrap()
    }

    fn known_runner(&self, runner_id: i64) -> bool {
        self.runners
            .lock()
            .unwrap()
            .values()
            .any(|ids| ids.contains(&runner_id))
    }
}

#[async_trait]
impl RaceGateway for StubGateway {
    async fn race(&self, race_id: i64) -> Lookup<RaceData> {
        *self.race_calls.lock().unwrap() += 1;
        if self.is_unavailable() {
            return Lookup::Unavailable("stub outage".into());
        }
        match self.races.lock().unwrap().get(&race_id) {
            Some(race) => Lookup::Found(race.clone()),
            None => Lookup::Missing,
        }
    }

    async fn runner(&self, runner_id: i64) -> Lookup<RunnerData> {
        if self.is_unavailable() {
            return Lookup::Unavailable("stub outage".into());
        }
        if self.known_runner(runner_id) {
            Lookup::Found(RunnerData {
                id: runner_id,
                details: serde_json::Map::new(),
            })
        } else {
            Lookup::Missing
        }
    }

    async fn race_runners(&self, race_id: i64) -> Lookup<Vec<RunnerData>> {
        if self.is_unavailable() {
            return Lookup::Unavailable("stub outage".into());
        }
        match self.runners.lock().unwrap().get(&race_id) {
            Some(ids) => Lookup::Found(
                ids.iter()
                    .map(|&id| RunnerData {
                        id,
                        details: serde_json::Map::new(),
                    })
                    .collect(),
            ),
            None => Lookup::Missing,
        }
    }
}

/// Application state over a test pool and a stub race catalog
pub struct TestApp {
    pub pool: PgPool,
    pub gateway: Arc<StubGateway>,
    pub state: Arc<AppState>,
}

impl TestApp {
    /// Build from an existing pool (useful with sqlx::test)
    pub fn from_pool(pool: PgPool) -> Self {
        let gateway = StubGateway::new();
        let handle: RaceGatewayHandle = gateway.clone();
        let state = Arc::new(AppState::new(pool.clone(), AppConfig::default(), handle));
        Self {
            pool,
            gateway,
            state,
        }
    }

    pub async fn balance_of(&self, account_id: Uuid) -> Decimal {
        self.state
            .user_repo
            .balance_of(account_id)
            .await
            .expect("Failed to read balance")
            .expect("Account should exist")
    }
}

/// Helper function to create a test account with a given balance
pub async fn create_test_account(app: &TestApp, name: &str, balance: i64) -> Account {
    let hash = hash_password("password123").expect("Failed to hash password");
    app.state
        .user_repo
        .create(
            name,
            &format!("{}@example.com", name.to_lowercase()),
            &hash,
            AccountRole::User,
            Decimal::from(balance),
        )
        .await
        .expect("Failed to create test account")
}

/// Helper function to create a test admin
pub async fn create_test_admin(app: &TestApp, name: &str) -> Account {
    let hash = hash_password("password123").expect("Failed to hash password");
    app.state
        .user_repo
        .create(
            name,
            &format!("{}@example.com", name.to_lowercase()),
            &hash,
            AccountRole::Admin,
            Decimal::ONE,
        )
        .await
        .expect("Failed to create test admin")
}

/// Helper function to create a catalog offer directly
pub async fn create_test_offer(app: &TestApp, race_id: i64, runner_id: i64, odds: i64) -> WagerOffer {
    app.state
        .offer_repo
        .create(race_id, runner_id, Decimal::from(odds), Some(1))
        .await
        .expect("Failed to create test offer")
}

/// Helper function to create a group owned by `owner`
pub async fn create_test_group(app: &TestApp, owner: &Account, name: &str) -> Group {
    app.state
        .groups
        .create_group(owner.id, name)
        .await
        .expect("Failed to create test group")
}
