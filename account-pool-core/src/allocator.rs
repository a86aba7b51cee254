//! Allocator: claim the first free account of a payer's pool for a user.
//!
//! Organizations has no conditional tag write, so a claim is verified instead: the
//! allocator writes a random `claim-token` together with the owner tags, waits for
//! the configured settle interval and reads the tags back. A writer that finds
//! somebody else's token lost the race and moves on to the next candidate.

use std::time::Duration;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::account::{
    validate_account_id, Account, ClaimState, Tags, CLAIMED_TAG, CLAIM_TOKEN_TAG, OWNER_TAG,
};
use crate::aws::OrganizationsApi;
use crate::config::{AllocationSettings, PayerConfig};
use crate::errors::{PoolError, PoolResult};
use crate::scanner::PoolScanner;

pub struct Allocator<'a> {
    organizations: &'a dyn OrganizationsApi,
    payer: &'a PayerConfig,
    claim_settle: Duration,
}

impl<'a> Allocator<'a> {
    #[must_use]
    pub fn new(
        organizations: &'a dyn OrganizationsApi,
        payer: &'a PayerConfig,
        settings: &AllocationSettings,
    ) -> Self {
        Self {
            organizations,
            payer,
            claim_settle: settings.claim_settle(),
        }
    }

    fn scanner(&self) -> PoolScanner<'a> {
        PoolScanner::new(self.organizations)
    }

    async fn is_eligible(&self, account: &Account) -> PoolResult<bool> {
        if !account.is_active() {
            debug!("Skipping account {}: status {}", account.id, account.status);
            return Ok(false);
        }
        Ok(self.scanner().claim_state(&account.id).await?.is_free())
    }

    /// Index of the first eligible account in `accounts`
    async fn first_untagged(&self, accounts: &[Account]) -> PoolResult<Option<usize>> {
        for (i, account) in accounts.iter().enumerate() {
            if self.is_eligible(account).await? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// First active account under `root_ou` carrying neither `owner` nor `claimed`,
    /// in listing order.
    ///
    /// # Errors
    /// `NoAccountsInRoot` for an empty root, `NoUntaggedAccounts` when nothing qualifies.
    pub async fn find_untagged_account(&self, root_ou: &str) -> PoolResult<String> {
        let accounts = self.scanner().list_pool_accounts(root_ou).await?;
        match self.first_untagged(&accounts).await? {
            Some(i) => Ok(accounts[i].id.clone()),
            None => Err(PoolError::NoUntaggedAccounts {
                parent_id: root_ou.to_string(),
            }),
        }
    }

    /// Write `owner=<owner>`, `claimed=true` and a fresh claim token; returns the token
    pub async fn tag_account(&self, account_id: &str, owner: &str) -> PoolResult<String> {
        let token = Uuid::new_v4().to_string();
        let tags = Tags::from([
            (OWNER_TAG.to_string(), owner.to_string()),
            (CLAIMED_TAG.to_string(), "true".to_string()),
            (CLAIM_TOKEN_TAG.to_string(), token.clone()),
        ]);
        self.organizations.tag_account(account_id, &tags).await?;
        Ok(token)
    }

    pub async fn move_account(&self, account_id: &str, from_ou: &str, to_ou: &str) -> PoolResult<()> {
        debug!("Moving account {account_id} from {from_ou} to {to_ou}");
        self.organizations
            .move_account(account_id, from_ou, to_ou)
            .await?;
        Ok(())
    }

    /// Tag `account_id` for `owner` and confirm no concurrent writer replaced the claim
    async fn claim(&self, account_id: &str, owner: &str) -> PoolResult<()> {
        let current = self.organizations.list_tags(account_id).await?;
        if !ClaimState::observe(account_id, &current).is_free() {
            return Err(PoolError::ClaimConflict {
                account_id: account_id.to_string(),
            });
        }

        let token = self.tag_account(account_id, owner).await?;
        if !self.claim_settle.is_zero() {
            tokio::time::sleep(self.claim_settle).await;
        }

        let written = self.organizations.list_tags(account_id).await?;
        let kept_token = written.get(CLAIM_TOKEN_TAG) == Some(&token);
        let kept_owner = written.get(OWNER_TAG).map(String::as_str) == Some(owner);
        if kept_token && kept_owner {
            Ok(())
        } else {
            Err(PoolError::ClaimConflict {
                account_id: account_id.to_string(),
            })
        }
    }

    /// Claim the first free account of the pool for `owner` and move it into the
    /// claimed OU. Returns the account ID.
    pub async fn run(&self, owner: &str) -> PoolResult<String> {
        let root = self.payer.root_ou_id.as_str();

        let accounts = self.scanner().list_pool_accounts(root).await?;
        let mut rest = accounts.as_slice();
        while let Some(i) = self.first_untagged(rest).await? {
            let account = &rest[i];
            rest = &rest[i + 1..];
            match self.claim(&account.id, owner).await {
                Ok(()) => {}
                Err(PoolError::ClaimConflict { account_id }) => {
                    warn!("Lost the claim on account {account_id} to a concurrent writer, trying the next one");
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.move_account(&account.id, root, &self.payer.claimed_ou_id)
                .await?;
            info!("Assigned account {} to {owner}", account.id);
            return Ok(account.id.clone());
        }

        Err(PoolError::NoUntaggedAccounts {
            parent_id: root.to_string(),
        })
    }

    /// Claim one specific pool account for `owner`.
    ///
    /// # Errors
    /// `AccountNotEligible` when the account is not in the pool root, not active or
    /// not free; `ClaimConflict` when a concurrent writer won.
    pub async fn claim_account(&self, account_id: &str, owner: &str) -> PoolResult<String> {
        validate_account_id(account_id)?;
        let root = self.payer.root_ou_id.as_str();
        let not_eligible = |reason: String| PoolError::AccountNotEligible {
            account_id: account_id.to_string(),
            reason,
        };

        let accounts = self.scanner().list_pool_accounts(root).await?;
        let account = accounts
            .iter()
            .find(|a| a.id == account_id)
            .ok_or_else(|| not_eligible(format!("it is not in the pool root {root}")))?;
        if !account.is_active() {
            return Err(not_eligible(format!("status is {}", account.status)));
        }
        match self.scanner().claim_state(account_id).await? {
            ClaimState::Free => {}
            ClaimState::Claimed { owner: current } => {
                return Err(not_eligible(format!("already claimed by '{current}'")));
            }
            ClaimState::PartiallyTagged { .. } => {
                return Err(not_eligible("it is partially tagged".to_string()));
            }
        }

        self.claim(account_id, owner).await?;
        self.move_account(account_id, root, &self.payer.claimed_ou_id)
            .await?;
        info!("Assigned account {account_id} to {owner}");
        Ok(account_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::config::PoolConfig;
    use crate::testing::InMemoryOrganizations;

    const ROOT: &str = "r-0wd6";
    const CLAIMED: &str = "ou-0wd6-z6tzkjek";

    fn payer() -> PayerConfig {
        PoolConfig::default()
            .payer("osd-staging-1")
            .unwrap()
            .clone()
    }

    fn no_settle() -> AllocationSettings {
        AllocationSettings {
            claim_settle_millis: 0,
        }
    }

    #[tokio::test]
    async fn test_find_untagged_account_first_free_wins() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Active, &[("owner", "x"), ("claimed", "true")]);
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[]);
        orgs.add_account(ROOT, "333333333333", AccountStatus::Active, &[]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        assert_eq!(
            allocator.find_untagged_account(ROOT).await.unwrap(),
            "222222222222"
        );
    }

    #[tokio::test]
    async fn test_find_untagged_account_skips_suspended() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Suspended, &[]);
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        assert_eq!(
            allocator.find_untagged_account(ROOT).await.unwrap(),
            "222222222222"
        );
        // Suspended accounts are rejected before their tags are read
        assert!(!orgs
            .calls()
            .contains(&"ListTagsForResource:111111111111".to_string()));
    }

    #[tokio::test]
    async fn test_partially_tagged_account_is_not_free() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[("claimed", "true")]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        let err = allocator.find_untagged_account(ROOT).await.unwrap_err();
        assert!(matches!(err, PoolError::NoUntaggedAccounts { .. }));
    }

    #[tokio::test]
    async fn test_run_tags_and_moves() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Active, &[]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        assert_eq!(allocator.run("alice").await.unwrap(), "111111111111");

        let tags = orgs.tags("111111111111");
        assert_eq!(tags.get("owner").map(String::as_str), Some("alice"));
        assert_eq!(tags.get("claimed").map(String::as_str), Some("true"));
        assert!(tags.contains_key(CLAIM_TOKEN_TAG));
        assert_eq!(orgs.parent("111111111111").as_deref(), Some(CLAIMED));
    }

    #[tokio::test]
    async fn test_run_claims_the_account_find_untagged_account_picks() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Suspended, &[]);
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[("claimed", "true")]);
        orgs.add_account(ROOT, "333333333333", AccountStatus::Active, &[]);
        orgs.add_account(ROOT, "444444444444", AccountStatus::Active, &[]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        let picked = allocator.find_untagged_account(ROOT).await.unwrap();
        let assigned = allocator.run("alice").await.unwrap();

        assert_eq!(picked, "333333333333");
        assert_eq!(assigned, picked);
        // The scan stops at the first free account
        assert!(!orgs
            .calls()
            .contains(&"ListTagsForResource:444444444444".to_string()));
    }

    #[tokio::test]
    async fn test_run_moves_on_after_losing_a_race() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Active, &[]);
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[]);
        orgs.add_rival_claim("111111111111", "mallory");
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        assert_eq!(allocator.run("alice").await.unwrap(), "222222222222");

        // The rival keeps its account and the loser never moves it
        let contested = orgs.tags("111111111111");
        assert_eq!(contested.get("owner").map(String::as_str), Some("mallory"));
        assert_eq!(orgs.parent("111111111111").as_deref(), Some(ROOT));
        assert_eq!(orgs.parent("222222222222").as_deref(), Some(CLAIMED));
    }

    #[tokio::test]
    async fn test_run_exhausted_after_conflict() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Active, &[]);
        orgs.add_rival_claim("111111111111", "mallory");
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        let err = allocator.run("alice").await.unwrap_err();
        assert!(matches!(err, PoolError::NoUntaggedAccounts { .. }));
    }

    #[tokio::test]
    async fn test_run_move_failure_is_returned() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Active, &[]);
        orgs.fail_on("MoveAccount:111111111111");
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        let err = allocator.run("alice").await.unwrap_err();
        assert!(matches!(err, PoolError::Aws(_)));
    }

    #[tokio::test]
    async fn test_run_empty_root() {
        let orgs = InMemoryOrganizations::new();
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        let err = allocator.run("alice").await.unwrap_err();
        assert!(matches!(err, PoolError::NoAccountsInRoot { .. }));
    }

    #[tokio::test]
    async fn test_claim_account_specific() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Active, &[]);
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        assert_eq!(
            allocator
                .claim_account("222222222222", "bob")
                .await
                .unwrap(),
            "222222222222"
        );
        assert_eq!(orgs.parent("222222222222").as_deref(), Some(CLAIMED));
        assert_eq!(orgs.parent("111111111111").as_deref(), Some(ROOT));
    }

    #[tokio::test]
    async fn test_claim_account_rejections() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(ROOT, "111111111111", AccountStatus::Suspended, &[]);
        orgs.add_account(ROOT, "222222222222", AccountStatus::Active, &[("owner", "carol"), ("claimed", "true")]);
        orgs.add_account(CLAIMED, "333333333333", AccountStatus::Active, &[]);
        let payer = payer();
        let allocator = Allocator::new(&orgs, &payer, &no_settle());

        for (account, expected) in [
            ("111111111111", "SUSPENDED"),
            ("222222222222", "carol"),
            ("333333333333", "not in the pool root"),
        ] {
            let err = allocator.claim_account(account, "bob").await.unwrap_err();
            assert!(
                matches!(err, PoolError::AccountNotEligible { .. }),
                "unexpected error for {account}: {err}"
            );
            assert!(err.to_string().contains(expected), "{err}");
        }
        assert!(orgs.mutations().is_empty());

        let err = allocator.claim_account("12345", "bob").await.unwrap_err();
        assert!(matches!(err, PoolError::InvalidAccountId(_)));
    }
}
