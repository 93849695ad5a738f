use crate::auth::{self, Claims, SessionKeys, MIN_PASSWORD_LEN};
use crate::error::{AppError, AppResult, RepositoryError};
use crate::models::account::normalize_email;
use crate::models::{Account, AccountRole};
use crate::repositories::{AccountChanges, UserRepository};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Fields accepted by `update_account`; role and balance are admin-only
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<AccountRole>,
    pub balance: Option<Decimal>,
}

/// Account plus the session token issued for it
#[derive(Debug, Clone)]
pub struct Session {
    pub account: Account,
    pub token: String,
}

/// Service for registration, login and account administration
pub struct AccountService {
    user_repo: Arc<UserRepository>,
    keys: SessionKeys,
    starting_balance: Decimal,
}

impl AccountService {
    pub fn new(user_repo: Arc<UserRepository>, keys: SessionKeys, starting_balance: Decimal) -> Self {
        Self {
            user_repo,
            keys,
            starting_balance,
        }
    }

    /// Register a new account and open a session for it
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AppResult<Session> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        let password_hash = auth::hash_password(password)?;
        let account = self
            .user_repo
            .create(
                &name,
                &email,
                &password_hash,
                AccountRole::User,
                self.starting_balance,
            )
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::BusinessLogic("An account with this email already exists".into())
                }
                other => other.into(),
            })?;

        info!("Registered account {} ({})", account.id, account.email);
        let token = self.keys.issue(&account)?;
        Ok(Session { account, token })
    }

    /// Check credentials and open a session
    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = normalize_email(email);
        let account = self.user_repo.find_by_email(&email).await?;

        let account = match account {
            Some(account) if auth::verify_password(password, &account.password_hash) => account,
            _ => {
                warn!("Failed login attempt for {}", email);
                return Err(AppError::Unauthorized("Invalid email or password".into()));
            }
        };

        info!("Account {} logged in", account.id);
        let token = self.keys.issue(&account)?;
        Ok(Session { account, token })
    }

    pub async fn list_accounts(&self) -> AppResult<Vec<Account>> {
        Ok(self.user_repo.list_all().await?)
    }

    pub async fn get_account(&self, id: Uuid) -> AppResult<Account> {
        self.user_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))
    }

    /// Update an account. Callers may edit themselves; admins may edit anyone.
    pub async fn update_account(
        &self,
        caller: &Claims,
        id: Uuid,
        update: AccountUpdate,
    ) -> AppResult<Account> {
        ensure_self_or_admin(caller, id)?;

        if (update.role.is_some() || update.balance.is_some()) && !caller.is_admin() {
            return Err(AppError::Forbidden(
                "Only an admin can change role or balance".into(),
            ));
        }

        let name = update.name.as_deref().map(validate_name).transpose()?;
        let email = update.email.as_deref().map(validate_email).transpose()?;
        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(auth::hash_password(password)?)
            }
            None => None,
        };
        if let Some(balance) = update.balance {
            if balance < Decimal::ZERO {
                return Err(AppError::Validation("Balance cannot be negative".into()));
            }
        }

        let changes = AccountChanges {
            name: name.as_deref(),
            email: email.as_deref(),
            password_hash: password_hash.as_deref(),
            role: update.role,
            balance: update.balance,
        };
        let account = self
            .user_repo
            .update(id, &changes)
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate(_) => {
                    AppError::BusinessLogic("An account with this email already exists".into())
                }
                other => other.into(),
            })?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

        info!("Account {} updated by {}", id, caller.sub);
        Ok(account)
    }

    /// Delete an account together with its stakes, memberships and owned groups
    pub async fn delete_account(&self, caller: &Claims, id: Uuid) -> AppResult<()> {
        ensure_self_or_admin(caller, id)?;

        if !self.user_repo.delete(id).await? {
            return Err(AppError::NotFound("Account not found".into()));
        }

        info!("Account {} deleted by {}", id, caller.sub);
        Ok(())
    }
}

fn ensure_self_or_admin(caller: &Claims, id: Uuid) -> AppResult<()> {
    if caller.sub != id && !caller.is_admin() {
        return Err(AppError::Forbidden(
            "You can only manage your own account".into(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::Validation("A valid email is required".into())),
    }
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(id: Uuid, role: &str) -> Claims {
        Claims {
            sub: id,
            email: "x@example.com".into(),
            role: role.into(),
            iat: 0,
            exp: 0,
        }
    }

    #[test]
    fn test_registration_validation() {
        assert_eq!(validate_name("  Ana ").unwrap(), "Ana");
        assert!(validate_name("   ").is_err());
        assert_eq!(validate_email(" Ana@Example.com").unwrap(), "ana@example.com");
        assert!(validate_email("ana.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_self_or_admin() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(ensure_self_or_admin(&claims(me, "user"), me).is_ok());
        assert!(matches!(
            ensure_self_or_admin(&claims(me, "user"), other),
            Err(AppError::Forbidden(_))
        ));
        assert!(ensure_self_or_admin(&claims(me, "admin"), other).is_ok());
    }
}
