//! Domain models for the marathon betting backend.
//!
//! This module contains all database-backed models: accounts, the wager
//! catalog, personal stakes, groups and their memberships.

pub mod account;
pub mod group;
pub mod group_member;
pub mod stake;
pub mod wager_offer;

// Re-export all models for convenient access
pub use account::{Account, AccountRole, AccountSummary};
pub use group::{Group, GroupSummary};
pub use group_member::GroupMember;
pub use stake::{Stake, StakeWithOffer};
pub use wager_offer::WagerOffer;
