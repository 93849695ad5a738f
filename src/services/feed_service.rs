//! Group-mates' upcoming wagers

use crate::error::AppResult;
use crate::models::{Account, Group, GroupSummary, Stake, WagerOffer};
use crate::repositories::{
    GroupMemberRepository, GroupRepository, StakeRepository, UserRepository, WagerOfferRepository,
};
use crate::services::race_gateway::{Lookup, RaceData, RaceGatewayHandle};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Public identity of the peer who placed a stake
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Race metadata attached to a feed entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceInfo {
    pub id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub kilometer: Option<serde_json::Value>,
}

impl From<&RaceData> for RaceInfo {
    fn from(race: &RaceData) -> Self {
        Self {
            id: race.id,
            name: race.name.clone(),
            start_date: race.start_date,
            kilometer: race.kilometer.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    pub stake: Stake,
    pub offer: WagerOffer,
    pub peer: Peer,
    pub race_info: RaceInfo,
    pub shared_groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FriendFeed {
    pub total: usize,
    pub bets: Vec<FeedEntry>,
}

impl FriendFeed {
    fn empty() -> Self {
        Self {
            total: 0,
            bets: Vec::new(),
        }
    }
}

/// Builds the feed of future stakes placed by an account's group-mates
pub struct FeedService {
    group_repo: Arc<GroupRepository>,
    member_repo: Arc<GroupMemberRepository>,
    stake_repo: Arc<StakeRepository>,
    offer_repo: Arc<WagerOfferRepository>,
    user_repo: Arc<UserRepository>,
    gateway: RaceGatewayHandle,
}

impl FeedService {
    pub fn new(
        group_repo: Arc<GroupRepository>,
        member_repo: Arc<GroupMemberRepository>,
        stake_repo: Arc<StakeRepository>,
        offer_repo: Arc<WagerOfferRepository>,
        user_repo: Arc<UserRepository>,
        gateway: RaceGatewayHandle,
    ) -> Self {
        Self {
            group_repo,
            member_repo,
            stake_repo,
            offer_repo,
            user_repo,
            gateway,
        }
    }

    pub async fn friends_future_bets(&self, account_id: Uuid) -> AppResult<FriendFeed> {
        let groups: HashMap<Uuid, Group> = self
            .group_repo
            .find_for_member(account_id)
            .await?
            .into_iter()
            .map(|group| (group.id, group))
            .collect();
        if groups.is_empty() {
            return Ok(FriendFeed::empty());
        }

        let group_ids: Vec<Uuid> = groups.keys().copied().collect();
        let mut shared: HashMap<Uuid, BTreeSet<Uuid>> = HashMap::new();
        for membership in self.member_repo.find_peers(&group_ids, account_id).await? {
            shared
                .entry(membership.user_id)
                .or_default()
                .insert(membership.group_id);
        }
        if shared.is_empty() {
            return Ok(FriendFeed::empty());
        }

        let peer_ids: Vec<Uuid> = shared.keys().copied().collect();
        let peers: HashMap<Uuid, Account> = self
            .user_repo
            .find_by_ids(&peer_ids)
            .await?
            .into_iter()
            .map(|account| (account.id, account))
            .collect();

        let stakes = self.stake_repo.find_by_users(&peer_ids).await?;
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

        let now = Utc::now();
        let mut races: HashMap<i64, Option<RaceData>> = HashMap::new();
        let mut bets = Vec::new();

        for stake in stakes {
            let (Some(offer), Some(peer)) = (offers.get(&stake.offer_id), peers.get(&stake.user_id))
            else {
                continue;
            };

            if !races.contains_key(&offer.race_id) {
                let race = match self.gateway.race(offer.race_id).await {
                    Lookup::Found(race) => Some(race),
                    _ => None,
                };
                races.insert(offer.race_id, race);
            }
            let Some(Some(race)) = races.get(&offer.race_id) else {
                debug!("Skipping stake {}: race {} unresolved", stake.id, offer.race_id);
                continue;
            };
            if race.start_date <= now {
                continue;
            }

            let shared_groups = shared
                .get(&stake.user_id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| groups.get(id))
                        .map(Group::summary)
                        .collect()
                })
                .unwrap_or_default();

            bets.push(FeedEntry {
                peer: Peer {
                    id: peer.id,
                    name: peer.name.clone(),
                    email: peer.email.clone(),
                },
                race_info: RaceInfo::from(race),
                offer: offer.clone(),
                stake,
                shared_groups,
            });
        }

        Ok(FriendFeed {
            total: bets.len(),
            bets,
        })
    }
}
