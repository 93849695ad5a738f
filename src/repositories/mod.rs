pub mod group_member_repository;
pub mod group_repository;
pub mod stake_repository;
pub mod user_repository;
pub mod wager_offer_repository;

// Re-export all repositories for convenient access
pub use group_member_repository::GroupMemberRepository;
pub use group_repository::GroupRepository;
pub use stake_repository::{StakeMovement, StakeRepository};
pub use user_repository::{AccountChanges, UserRepository};
pub use wager_offer_repository::WagerOfferRepository;
