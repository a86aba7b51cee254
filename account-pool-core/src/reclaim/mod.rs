//! Reclamation: return claimed accounts to the pool root and empty them of
//! tenant IAM artifacts.
//!
//! Targets are resolved and checked against the protected-owner and payer guards
//! before anything is changed: only accounts in the claimed OU or the pool root
//! are touched. Untag, move and the cross-account session are fail-fast; the IAM
//! teardown keeps going and reports per artifact.

pub mod report;
pub mod teardown;

use std::fmt;

use chrono::Utc;
use log::{debug, info, warn};

use crate::account::{validate_account_id, ClaimState, CLAIMED_TAG, CLAIM_TOKEN_TAG, OWNER_TAG};
use crate::aws::{IamApi, OrganizationsApi, StsApi, TaggingApi};
use crate::config::{PayerConfig, ReclaimSettings};
use crate::errors::{PoolError, PoolResult};
use crate::ownership::OwnershipIndex;

pub use report::{AccountReport, ArtifactKind, ArtifactOutcome, ArtifactStatus};
pub use teardown::{is_protected_role, Teardown};

/// Yes/no gate asked once before a batch is reclaimed
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// What to reclaim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReclaimTarget {
    Account(String),
    /// Every account tagged `owner=<user>`
    User(String),
}

impl fmt::Display for ReclaimTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account(id) => write!(f, "account {id}"),
            Self::User(user) => write!(f, "accounts of user '{user}'"),
        }
    }
}

#[derive(Debug)]
pub enum ReclaimOutcome {
    /// The operator answered no; nothing was changed
    Declined,
    Completed(Vec<AccountReport>),
}

/// Account resolved for reclamation, with the owner observed at resolution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAccount {
    pub account_id: String,
    pub owner: Option<String>,
}

pub struct Reclaimer<'a> {
    organizations: &'a dyn OrganizationsApi,
    tagging: &'a dyn TaggingApi,
    sts: &'a dyn StsApi,
    payer: &'a PayerConfig,
    settings: &'a ReclaimSettings,
}

impl<'a> Reclaimer<'a> {
    #[must_use]
    pub fn new(
        organizations: &'a dyn OrganizationsApi,
        tagging: &'a dyn TaggingApi,
        sts: &'a dyn StsApi,
        payer: &'a PayerConfig,
        settings: &'a ReclaimSettings,
    ) -> Self {
        Self {
            organizations,
            tagging,
            sts,
            payer,
            settings,
        }
    }

    /// Resolve `target` to accounts and apply the guards. Nothing is mutated.
    ///
    /// Accounts found through the tag index whose current `owner` tag names
    /// somebody else are dropped, since the index lags behind tag writes.
    ///
    /// # Errors
    /// `ProtectedOwner` when the username or any resolved owner is a system identity,
    /// `PayerAccountTarget` when a target is the payer itself, `NotInPool` when a
    /// target is neither in the claimed OU nor in the pool root, plus the ownership
    /// lookup errors.
    pub async fn resolve_targets(&self, target: &ReclaimTarget) -> PoolResult<Vec<PlannedAccount>> {
        let (account_ids, user) = match target {
            ReclaimTarget::Account(id) => {
                validate_account_id(id)?;
                (vec![id.clone()], None)
            }
            ReclaimTarget::User(user) => {
                if self.settings.is_protected_owner(user) {
                    return Err(PoolError::protected_owner("-", user.as_str()));
                }
                let ids = OwnershipIndex::new(self.organizations, self.tagging)
                    .list_accounts_by_user(user)
                    .await?;
                (ids, Some(user.as_str()))
            }
        };

        let payer_account = self.sts.caller_account_id().await?;
        let mut planned = Vec::with_capacity(account_ids.len());
        for account_id in account_ids {
            if account_id == payer_account {
                return Err(PoolError::PayerAccountTarget { account_id });
            }

            let tags = self.organizations.list_tags(&account_id).await?;
            let owner = ClaimState::observe(&account_id, &tags)
                .owner()
                .map(str::to_string);
            if let Some(user) = user {
                if owner.as_deref() != Some(user) {
                    warn!(
                        "Skipping account {account_id}: indexed for '{user}' but owned by '{}'",
                        owner.as_deref().unwrap_or("-")
                    );
                    continue;
                }
            }
            match &owner {
                Some(owner) if self.settings.is_protected_owner(owner) => {
                    return Err(PoolError::protected_owner(account_id, owner.as_str()));
                }
                Some(_) => {}
                None => warn!("Account {account_id} has no owner tag"),
            }
            self.pool_parent(&account_id).await?;
            planned.push(PlannedAccount { account_id, owner });
        }

        match user {
            Some(user) if planned.is_empty() => Err(PoolError::NoAccountsForUser {
                user: user.to_string(),
            }),
            _ => Ok(planned),
        }
    }

    /// Current parent of `account_id`, which must be the claimed OU or the pool root
    async fn pool_parent(&self, account_id: &str) -> PoolResult<String> {
        let parent = self.organizations.parent_of(account_id).await?;
        if parent == self.payer.root_ou_id || parent == self.payer.claimed_ou_id {
            Ok(parent)
        } else {
            Err(PoolError::NotInPool {
                account_id: account_id.to_string(),
                parent_id: parent,
            })
        }
    }

    /// Remove the claim tags. Does nothing when none of them is present.
    pub async fn untag_account(&self, account_id: &str) -> PoolResult<()> {
        let tags = self.organizations.list_tags(account_id).await?;
        let present: Vec<String> = [OWNER_TAG, CLAIMED_TAG, CLAIM_TOKEN_TAG]
            .into_iter()
            .filter(|key| tags.contains_key(*key))
            .map(str::to_string)
            .collect();
        if present.is_empty() {
            debug!("Account {account_id} carries no claim tags");
            return Ok(());
        }
        self.organizations
            .untag_account(account_id, &present)
            .await?;
        info!("Removed tags {} from account {account_id}", present.join(", "));
        Ok(())
    }

    /// Move the account from the claimed OU back under the pool root, unless it
    /// already is there.
    ///
    /// # Errors
    /// `NotInPool` when the account is anywhere else.
    pub async fn move_account(&self, account_id: &str) -> PoolResult<()> {
        let root = self.payer.root_ou_id.as_str();
        let claimed = self.payer.claimed_ou_id.as_str();
        if self.pool_parent(account_id).await? == root {
            debug!("Account {account_id} already under {root}");
            return Ok(());
        }
        self.organizations
            .move_account(account_id, claimed, root)
            .await?;
        info!("Moved account {account_id} from {claimed} to {root}");
        Ok(())
    }

    /// Untag, move and open the IAM session for one account
    async fn release(&self, account_id: &str) -> PoolResult<Box<dyn IamApi>> {
        self.untag_account(account_id).await?;
        self.move_account(account_id).await?;
        self.assume_role_for_account(account_id).await
    }

    /// IAM client running as the admin role inside `account_id`
    pub async fn assume_role_for_account(&self, account_id: &str) -> PoolResult<Box<dyn IamApi>> {
        let role_arn = format!(
            "arn:aws:iam::{account_id}:role/{}",
            self.settings.admin_role_name
        );
        let session_name = format!(
            "{}-{}",
            self.settings.session_name_prefix,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        debug!("Assuming {role_arn} as {session_name}");
        Ok(self
            .sts
            .assume_role_for_iam(&role_arn, &session_name, self.settings.session_duration_seconds)
            .await?)
    }

    /// Resolve, confirm, then reclaim every target account in turn.
    ///
    /// # Errors
    /// Guard and lookup errors before any change. `ReclaimAborted` on the first
    /// untag, move or assume-role failure, carrying the reports of the accounts
    /// already torn down. `TeardownIncomplete` when any IAM artifact could not be
    /// removed.
    pub async fn run(&self, target: &ReclaimTarget, confirm: &dyn Confirm) -> PoolResult<ReclaimOutcome> {
        let planned = self.resolve_targets(target).await?;

        let ids: Vec<&str> = planned.iter().map(|p| p.account_id.as_str()).collect();
        let prompt = format!(
            "Reclaim {target} ({}) into {}? All IAM users, roles and policies in them will be deleted.",
            ids.join(", "),
            self.payer.root_ou_id
        );
        if !confirm.confirm(&prompt) {
            info!("Reclamation of {target} declined");
            return Ok(ReclaimOutcome::Declined);
        }

        let mut reports = Vec::with_capacity(planned.len());
        for account in planned {
            let iam = match self.release(&account.account_id).await {
                Ok(iam) => iam,
                Err(source) => {
                    return Err(PoolError::ReclaimAborted {
                        account_id: account.account_id,
                        source: Box::new(source),
                        reports,
                    });
                }
            };

            let mut report = AccountReport::new(account.account_id, account.owner);
            Teardown::new(iam.as_ref(), self.settings)
                .run(&mut report)
                .await;
            info!(
                "Account {}: {} artifact(s) deleted, {} failed",
                report.account_id,
                report.deleted_count(),
                report.failed_count()
            );
            reports.push(report);
        }

        if reports.iter().all(AccountReport::is_clean) {
            Ok(ReclaimOutcome::Completed(reports))
        } else {
            Err(PoolError::teardown_incomplete(reports))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::config::PoolConfig;
    use crate::testing::{InMemoryOrganizations, InMemorySts};

    const PAYER: &str = "999999999999";
    const ROOT: &str = "r-0wd6";
    const CLAIMED: &str = "ou-0wd6-z6tzkjek";

    fn payer() -> PayerConfig {
        PoolConfig::default()
            .payer("osd-staging-1")
            .unwrap()
            .clone()
    }

    fn claimed_by(owner: &str) -> [(&str, &str); 3] {
        [("owner", owner), ("claimed", "true"), ("claim-token", "t-1")]
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    #[tokio::test]
    async fn test_protected_owner_is_refused_before_any_mutation() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("hivesomething"));
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::Account("111111111111".to_string()), &yes)
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::ProtectedOwner { .. }));
        assert!(orgs.mutations().is_empty());
        assert!(sts.calls().is_empty());
    }

    #[tokio::test]
    async fn test_protected_username_is_refused_before_lookup() {
        let orgs = InMemoryOrganizations::new();
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .resolve_targets(&ReclaimTarget::User("hive-admin".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::ProtectedOwner { .. }));
        assert!(orgs.calls().is_empty());
    }

    #[tokio::test]
    async fn test_payer_account_is_refused() {
        let orgs = InMemoryOrganizations::new();
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::Account(PAYER.to_string()), &yes)
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::PayerAccountTarget { .. }));
        assert!(orgs.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_declined_changes_nothing() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let outcome = reclaimer
            .run(&ReclaimTarget::User("alice".to_string()), &no)
            .await
            .unwrap();

        assert!(matches!(outcome, ReclaimOutcome::Declined));
        assert!(orgs.mutations().is_empty());
        assert!(sts.calls().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_is_asked_once_per_batch() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        orgs.add_account(CLAIMED, "222222222222", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let prompts = std::sync::Mutex::new(Vec::new());
        let recorder = |prompt: &str| {
            prompts.lock().unwrap().push(prompt.to_string());
            true
        };
        let outcome = reclaimer
            .run(&ReclaimTarget::User("alice".to_string()), &recorder)
            .await
            .unwrap();

        let prompts = prompts.into_inner().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("111111111111, 222222222222"));
        let ReclaimOutcome::Completed(reports) = outcome else {
            panic!("expected completed reclamation");
        };
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].owner.as_deref(), Some("alice"));
        assert_eq!(orgs.parent("111111111111").as_deref(), Some(ROOT));
        assert_eq!(orgs.parent("222222222222").as_deref(), Some(ROOT));
    }

    #[test_log::test(tokio::test)]
    async fn test_reclaim_account_end_to_end() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        let iam = sts.iam_for("111111111111");
        iam.add_role("OrganizationAccountAccessRole", "/");
        iam.add_user("alice");
        iam.add_access_key("alice", "AKIA1");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let outcome = reclaimer
            .run(&ReclaimTarget::Account("111111111111".to_string()), &yes)
            .await
            .unwrap();

        assert!(matches!(outcome, ReclaimOutcome::Completed(ref r) if r[0].is_clean()));
        assert!(orgs.tags("111111111111").is_empty());
        assert_eq!(orgs.parent("111111111111").as_deref(), Some(ROOT));
        assert!(iam.user_names().is_empty());
        assert_eq!(iam.role_names(), vec!["OrganizationAccountAccessRole"]);

        let sts_calls = sts.calls();
        assert_eq!(sts_calls[0], "AssumeRole:111111111111");
        assert!(sts_calls[1].starts_with("Session:account-pool-reclaim-"));
        // untag, then move, then teardown
        assert_eq!(
            orgs.mutations(),
            vec!["UntagResource:111111111111", "MoveAccount:111111111111"]
        );
    }

    #[tokio::test]
    async fn test_second_reclaim_is_idempotent() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        sts.iam_for("111111111111").add_user("alice");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);
        let target = ReclaimTarget::Account("111111111111".to_string());

        reclaimer.run(&target, &yes).await.unwrap();
        let before = orgs.mutations().len();
        let outcome = reclaimer.run(&target, &yes).await.unwrap();

        let ReclaimOutcome::Completed(reports) = outcome else {
            panic!("expected completed reclamation");
        };
        assert_eq!(reports[0].failed_count(), 0);
        assert_eq!(reports[0].deleted_count(), 0);
        // Already untagged and already under root: no further writes
        assert_eq!(orgs.mutations().len(), before);
    }

    #[tokio::test]
    async fn test_assume_role_failure_aborts() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        sts.fail_on("AssumeRole:111111111111");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::Account("111111111111".to_string()), &yes)
            .await
            .unwrap_err();

        let PoolError::ReclaimAborted { account_id, source, reports } = err else {
            panic!("expected ReclaimAborted");
        };
        assert_eq!(account_id, "111111111111");
        assert!(matches!(*source, PoolError::Aws(_)));
        assert!(reports.is_empty());
        assert!(sts.iam_for("111111111111").calls().is_empty());
    }

    #[tokio::test]
    async fn test_move_failure_aborts_before_teardown() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        orgs.fail_on("MoveAccount:111111111111");
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::Account("111111111111".to_string()), &yes)
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::ReclaimAborted { ref source, .. } if matches!(**source, PoolError::Aws(_))));
        assert!(sts.calls().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_failures_are_reported() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        let iam = sts.iam_for("111111111111");
        iam.add_user("alice");
        iam.add_access_key("alice", "AKIA1");
        iam.fail_on("DeleteAccessKey:alice/AKIA1");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::Account("111111111111".to_string()), &yes)
            .await
            .unwrap_err();

        let PoolError::TeardownIncomplete { failed, reports } = err else {
            panic!("expected TeardownIncomplete");
        };
        assert_eq!(failed, 2);
        assert_eq!(reports[0].account_id, "111111111111");
        // Untag and move happened regardless
        assert_eq!(orgs.parent("111111111111").as_deref(), Some(ROOT));
    }

    #[tokio::test]
    async fn test_account_outside_the_pool_is_refused() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account("ou-0wd6-production", "444444444444", AccountStatus::Active, &[]);
        let sts = InMemorySts::new(PAYER);
        let iam = sts.iam_for("444444444444");
        iam.add_user("prod-deployer");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::Account("444444444444".to_string()), &yes)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PoolError::NotInPool { ref parent_id, .. } if parent_id == "ou-0wd6-production"
        ));
        assert!(orgs.mutations().is_empty());
        assert!(sts.calls().is_empty());
        assert_eq!(orgs.parent("444444444444").as_deref(), Some("ou-0wd6-production"));
        assert_eq!(iam.user_names(), vec!["prod-deployer"]);
    }

    #[tokio::test]
    async fn test_move_refuses_account_outside_the_pool() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account("ou-0wd6-quarantine", "111111111111", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer.move_account("111111111111").await.unwrap_err();

        assert!(matches!(err, PoolError::NotInPool { .. }));
        assert_eq!(orgs.parent("111111111111").as_deref(), Some("ou-0wd6-quarantine"));
    }

    #[tokio::test]
    async fn test_stale_index_entry_for_another_owner_is_skipped() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        orgs.add_account(CLAIMED, "222222222222", AccountStatus::Active, &claimed_by("bob"));
        // the tag index still lists 222222222222 under its previous owner
        orgs.add_tagged_resource(
            &InMemoryOrganizations::account_arn("222222222222"),
            &[("owner", "alice")],
        );
        let sts = InMemorySts::new(PAYER);
        sts.iam_for("222222222222").add_user("bob");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let outcome = reclaimer
            .run(&ReclaimTarget::User("alice".to_string()), &yes)
            .await
            .unwrap();

        let ReclaimOutcome::Completed(reports) = outcome else {
            panic!("expected completed reclamation");
        };
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].account_id, "111111111111");
        assert_eq!(orgs.parent("222222222222").as_deref(), Some(CLAIMED));
        assert_eq!(
            orgs.tags("222222222222").get("owner").map(String::as_str),
            Some("bob")
        );
        assert_eq!(sts.iam_for("222222222222").user_names(), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_only_stale_index_entries_means_no_accounts() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "222222222222", AccountStatus::Active, &claimed_by("bob"));
        orgs.add_tagged_resource(
            &InMemoryOrganizations::account_arn("222222222222"),
            &[("owner", "alice")],
        );
        let sts = InMemorySts::new(PAYER);
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .resolve_targets(&ReclaimTarget::User("alice".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, PoolError::NoAccountsForUser { ref user } if user == "alice"));
    }

    #[tokio::test]
    async fn test_abort_keeps_reports_of_finished_accounts() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED, "111111111111", AccountStatus::Active, &claimed_by("alice"));
        orgs.add_account(CLAIMED, "222222222222", AccountStatus::Active, &claimed_by("alice"));
        let sts = InMemorySts::new(PAYER);
        let iam = sts.iam_for("111111111111");
        iam.add_user("alice");
        iam.add_access_key("alice", "AKIA1");
        iam.fail_on("DeleteAccessKey:alice/AKIA1");
        sts.fail_on("AssumeRole:222222222222");
        let (payer, settings) = (payer(), ReclaimSettings::default());
        let reclaimer = Reclaimer::new(&orgs, &orgs, &sts, &payer, &settings);

        let err = reclaimer
            .run(&ReclaimTarget::User("alice".to_string()), &yes)
            .await
            .unwrap_err();

        let PoolError::ReclaimAborted { account_id, source, reports } = err else {
            panic!("expected ReclaimAborted");
        };
        assert_eq!(account_id, "222222222222");
        assert!(matches!(*source, PoolError::Aws(_)));
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].account_id, "111111111111");
        assert!(reports[0]
            .failures()
            .any(|a| a.kind == ArtifactKind::AccessKey && a.name == "alice/AKIA1"));
    }
}
