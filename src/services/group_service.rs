use crate::auth::Claims;
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::{Account, AccountSummary, Group, GroupMember};
use crate::repositories::{GroupMemberRepository, GroupRepository};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Attempts at drawing an unused invite code
const INVITE_CODE_ATTEMPTS: usize = 5;

/// What happened when an account left a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    /// The membership was removed
    Left,
    /// The owner left, so the group and all memberships are gone
    Disbanded,
}

/// Order accounts for a group leaderboard: ascending balance, ties by name
pub fn rank_by_balance(accounts: Vec<Account>) -> Vec<AccountSummary> {
    let mut ranking: Vec<AccountSummary> = accounts.iter().map(Account::summary).collect();
    ranking.sort_by(|a, b| a.balance.cmp(&b.balance).then_with(|| a.name.cmp(&b.name)));
    ranking
}

/// Service for groups, memberships and rankings
pub struct GroupService {
    group_repo: Arc<GroupRepository>,
    member_repo: Arc<GroupMemberRepository>,
}

impl GroupService {
    pub fn new(group_repo: Arc<GroupRepository>, member_repo: Arc<GroupMemberRepository>) -> Self {
        Self {
            group_repo,
            member_repo,
        }
    }

    /// Create a group owned (and joined) by `owner_id`
    pub async fn create_group(&self, owner_id: Uuid, name: &str) -> AppResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Group name is required".into()));
        }

        for attempt in 1..=INVITE_CODE_ATTEMPTS {
            let code = Group::generate_invite_code();
            match self.group_repo.create_with_owner(name, &code, owner_id).await {
                Ok(group) => {
                    info!("Created group {} ({}) owned by {}", group.name, group.id, owner_id);
                    return Ok(group);
                }
                Err(RepositoryError::Duplicate(_)) => {
                    warn!("Invite code collision on attempt {}", attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Message(
            "Could not allocate a unique invite code".into(),
        ))
    }

    /// Join a group by invite code
    pub async fn join_group(&self, account_id: Uuid, code: &str) -> AppResult<(Group, GroupMember)> {
        let group = self
            .group_repo
            .find_by_code(code.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("No group with this invite code".into()))?;

        if group.is_owned_by(account_id) {
            return Err(AppError::BusinessLogic(
                "You already own this group".into(),
            ));
        }

        let member = self
            .member_repo
            .add_member(group.id, account_id)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::BusinessLogic("You are already a member of this group".into())
                }
                other => other.into(),
            })?;

        info!("Account {} joined group {}", account_id, group.id);
        Ok((group, member))
    }

    /// Leave a group; the owner leaving disbands it
    pub async fn leave_group(&self, account_id: Uuid, group_id: Uuid) -> AppResult<LeaveOutcome> {
        let group = self.find_group(group_id).await?;

        if group.is_owned_by(account_id) {
            self.group_repo.delete(group_id).await?;
            info!("Owner {} left group {}; group disbanded", account_id, group_id);
            return Ok(LeaveOutcome::Disbanded);
        }

        if !self.member_repo.remove_member(group_id, account_id).await? {
            return Err(AppError::NotFound(
                "You are not a member of this group".into(),
            ));
        }

        info!("Account {} left group {}", account_id, group_id);
        Ok(LeaveOutcome::Left)
    }

    /// Remove a member; only the owner may do this
    pub async fn ban_user(&self, group_id: Uuid, acting_id: Uuid, target_id: Uuid) -> AppResult<()> {
        let group = self.find_group(group_id).await?;

        if !group.is_owned_by(acting_id) {
            warn!("Account {} tried to ban from group {} without owning it", acting_id, group_id);
            return Err(AppError::Forbidden(
                "Only the group owner can ban members".into(),
            ));
        }
        if target_id == acting_id {
            return Err(AppError::Validation(
                "The owner cannot ban themselves".into(),
            ));
        }

        if !self.member_repo.remove_member(group_id, target_id).await? {
            return Err(AppError::NotFound(
                "This account is not a member of the group".into(),
            ));
        }

        info!("Account {} banned from group {} by {}", target_id, group_id, acting_id);
        Ok(())
    }

    /// Members of a group ordered by ascending balance
    pub async fn ranking(&self, group_id: Uuid) -> AppResult<Vec<AccountSummary>> {
        self.find_group(group_id).await?;
        let accounts = self.member_repo.member_accounts(group_id).await?;
        Ok(rank_by_balance(accounts))
    }

    /// Members of a group, visible to its members and to admins
    pub async fn members(&self, caller: &Claims, group_id: Uuid) -> AppResult<Vec<AccountSummary>> {
        self.find_group(group_id).await?;

        if !caller.is_admin() && !self.member_repo.is_member(group_id, caller.sub).await? {
            return Err(AppError::Forbidden(
                "Only members can see this group".into(),
            ));
        }

        let mut members: Vec<AccountSummary> = self
            .member_repo
            .member_accounts(group_id)
            .await?
            .iter()
            .map(Account::summary)
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(members)
    }

    pub async fn my_groups(&self, account_id: Uuid) -> AppResult<Vec<Group>> {
        Ok(self.group_repo.find_for_member(account_id).await?)
    }

    pub async fn list_groups(&self) -> AppResult<Vec<Group>> {
        Ok(self.group_repo.list_all().await?)
    }

    /// Delete a group outright; memberships cascade
    pub async fn delete_group(&self, group_id: Uuid) -> AppResult<()> {
        if !self.group_repo.delete(group_id).await? {
            return Err(AppError::NotFound("Group not found".into()));
        }

        info!("Deleted group {}", group_id);
        Ok(())
    }

    async fn find_group(&self, group_id: Uuid) -> AppResult<Group> {
        self.group_repo
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Group not found".into()))
    }
}
