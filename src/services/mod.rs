pub mod account_service;
pub mod catalog_service;
pub mod feed_service;
pub mod group_service;
pub mod ledger_service;
pub mod race_gateway;
pub mod wager_window;

pub use account_service::{AccountService, AccountUpdate, Session};
pub use catalog_service::{CatalogService, GenerationReport};
pub use feed_service::{FeedService, FriendFeed};
pub use group_service::{GroupService, LeaveOutcome};
pub use ledger_service::{CancelledStake, LedgerService, PlacedStake};
pub use race_gateway::{HttpRaceGateway, Lookup, RaceData, RaceGateway, RaceGatewayHandle, RunnerData};
