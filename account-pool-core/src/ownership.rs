//! Ownership index: who owns an account, which accounts a user owns, and the
//! owner map of a whole OU.
//!
//! Each direction uses a different API. Account to owner is a tag read, owner to
//! accounts goes through the resource tagging index, and the OU map needs one tag
//! read per account. Nothing is cached between calls.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::account::{account_id_from_arn, OWNER_TAG};
use crate::aws::{OrganizationsApi, TaggingApi};
use crate::errors::{PoolError, PoolResult};

/// Owner name to the accounts it owns, sorted by owner
pub type OwnerMap = BTreeMap<String, Vec<String>>;

pub struct OwnershipIndex<'a> {
    organizations: &'a dyn OrganizationsApi,
    tagging: &'a dyn TaggingApi,
}

impl<'a> OwnershipIndex<'a> {
    #[must_use]
    pub fn new(organizations: &'a dyn OrganizationsApi, tagging: &'a dyn TaggingApi) -> Self {
        Self {
            organizations,
            tagging,
        }
    }

    /// Owner of `account_id`, from its `owner` tag.
    ///
    /// # Errors
    /// `NoTagsOnAccount` for an untagged account, `NoOwnerTag` when other tags exist.
    pub async fn list_user_name(&self, account_id: &str) -> PoolResult<String> {
        let tags = self.organizations.list_tags(account_id).await?;
        if tags.is_empty() {
            return Err(PoolError::NoTagsOnAccount {
                account_id: account_id.to_string(),
            });
        }
        tags.get(OWNER_TAG)
            .cloned()
            .ok_or_else(|| PoolError::NoOwnerTag {
                account_id: account_id.to_string(),
            })
    }

    /// Accounts tagged `owner=<user>`, via the reverse tag index.
    ///
    /// # Errors
    /// `NoResources` when nothing carries the tag, `NoAccountsForUser` when no
    /// matched ARN ends in an account ID.
    pub async fn list_accounts_by_user(&self, user: &str) -> PoolResult<Vec<String>> {
        let arns = self.tagging.find_resource_arns(OWNER_TAG, user).await?;
        if arns.is_empty() {
            return Err(PoolError::NoResources {
                user: user.to_string(),
            });
        }

        let mut accounts = Vec::with_capacity(arns.len());
        for arn in &arns {
            match account_id_from_arn(arn) {
                Some(id) if !accounts.iter().any(|a| a == id) => accounts.push(id.to_string()),
                Some(_) => {}
                None => debug!("Skipping non-account resource {arn} tagged owner={user}"),
            }
        }

        if accounts.is_empty() {
            return Err(PoolError::NoAccountsForUser {
                user: user.to_string(),
            });
        }
        Ok(accounts)
    }

    /// Group every account under `parent_ou` by owner. Unowned accounts are skipped.
    ///
    /// # Errors
    /// `NoAccountsForParent` for an empty OU, `AccountsWithNoOwner` when no account
    /// has an owner, which usually means the wrong OU was passed.
    pub async fn list_all_accounts(&self, parent_ou: &str) -> PoolResult<OwnerMap> {
        let accounts = self
            .organizations
            .list_accounts_for_parent(parent_ou)
            .await?;
        if accounts.is_empty() {
            return Err(PoolError::NoAccountsForParent {
                parent_id: parent_ou.to_string(),
            });
        }

        let mut owners = OwnerMap::new();
        let mut unowned = 0;
        for account in &accounts {
            let tags = self.organizations.list_tags(&account.id).await?;
            match tags.get(OWNER_TAG) {
                Some(owner) => owners
                    .entry(owner.clone())
                    .or_default()
                    .push(account.id.clone()),
                None => unowned += 1,
            }
        }

        if owners.is_empty() {
            return Err(PoolError::AccountsWithNoOwner {
                parent_id: parent_ou.to_string(),
                count: unowned,
            });
        }
        if unowned > 0 {
            warn!("{unowned} account(s) under {parent_ou} have no owner tag");
        }
        Ok(owners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::testing::InMemoryOrganizations;

    const CLAIMED_OU: &str = "ou-0wd6-z6tzkjek";

    #[tokio::test]
    async fn test_list_user_name() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED_OU, "111111111111", AccountStatus::Active, &[("owner", "tuser")]);
        let index = OwnershipIndex::new(&orgs, &orgs);

        assert_eq!(index.list_user_name("111111111111").await.unwrap(), "tuser");
    }

    #[tokio::test]
    async fn test_list_user_name_no_tags() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED_OU, "111111111111", AccountStatus::Active, &[]);
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_user_name("111111111111").await.unwrap_err();
        assert!(matches!(err, PoolError::NoTagsOnAccount { .. }));
    }

    #[tokio::test]
    async fn test_list_user_name_no_owner_tag() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED_OU, "111111111111", AccountStatus::Active, &[("claimed", "true")]);
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_user_name("111111111111").await.unwrap_err();
        assert!(matches!(err, PoolError::NoOwnerTag { .. }));
    }

    #[tokio::test]
    async fn test_list_user_name_propagates_aws_errors() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED_OU, "111111111111", AccountStatus::Active, &[]);
        orgs.fail_on("ListTagsForResource:111111111111");
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_user_name("111111111111").await.unwrap_err();
        assert!(matches!(err, PoolError::Aws(_)));
    }

    #[tokio::test]
    async fn test_list_accounts_by_user() {
        let orgs = InMemoryOrganizations::new();
        let owned = [("owner", "alice"), ("claimed", "true")];
        orgs.add_account(CLAIMED_OU, "111111111111", AccountStatus::Active, &owned);
        orgs.add_account(CLAIMED_OU, "222222222222", AccountStatus::Active, &[("owner", "bob"), ("claimed", "true")]);
        orgs.add_account(CLAIMED_OU, "333333333333", AccountStatus::Active, &owned);
        let index = OwnershipIndex::new(&orgs, &orgs);

        let accounts = index.list_accounts_by_user("alice").await.unwrap();
        assert_eq!(accounts, vec!["111111111111", "333333333333"]);
    }

    #[tokio::test]
    async fn test_list_accounts_by_user_no_resources() {
        let orgs = InMemoryOrganizations::new();
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_accounts_by_user("nobody").await.unwrap_err();
        assert!(matches!(err, PoolError::NoResources { user } if user == "nobody"));
    }

    #[tokio::test]
    async fn test_list_accounts_by_user_no_account_ids() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_tagged_resource(
            "arn:aws:organizations::000000000000:ou/o-fake0000/ou-abcd-efgh1234",
            &[("owner", "alice")],
        );
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_accounts_by_user("alice").await.unwrap_err();
        assert!(matches!(err, PoolError::NoAccountsForUser { .. }));
    }

    #[tokio::test]
    async fn test_list_all_accounts() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(
            CLAIMED_OU,
            "111111111111",
            AccountStatus::Active,
            &[("owner", "randuser"), ("claimed", "true")],
        );
        let index = OwnershipIndex::new(&orgs, &orgs);

        let owners = index.list_all_accounts(CLAIMED_OU).await.unwrap();
        assert_eq!(
            owners,
            OwnerMap::from([("randuser".to_string(), vec!["111111111111".to_string()])])
        );
    }

    #[tokio::test]
    async fn test_list_all_accounts_groups_and_skips_unowned() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(CLAIMED_OU, "111111111111", AccountStatus::Active, &[("owner", "a"), ("claimed", "true")]);
        orgs.add_account(CLAIMED_OU, "222222222222", AccountStatus::Active, &[]);
        orgs.add_account(CLAIMED_OU, "333333333333", AccountStatus::Active, &[("owner", "a"), ("claimed", "true")]);
        let index = OwnershipIndex::new(&orgs, &orgs);

        let owners = index.list_all_accounts(CLAIMED_OU).await.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners["a"], vec!["111111111111", "333333333333"]);
    }

    #[tokio::test]
    async fn test_list_all_accounts_empty_parent() {
        let orgs = InMemoryOrganizations::new();
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_all_accounts(CLAIMED_OU).await.unwrap_err();
        assert!(matches!(err, PoolError::NoAccountsForParent { .. }));
    }

    #[tokio::test]
    async fn test_list_all_accounts_none_owned() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account("r-0wd6", "111111111111", AccountStatus::Active, &[]);
        orgs.add_account("r-0wd6", "222222222222", AccountStatus::Active, &[("team", "x")]);
        let index = OwnershipIndex::new(&orgs, &orgs);

        let err = index.list_all_accounts("r-0wd6").await.unwrap_err();
        assert!(matches!(err, PoolError::AccountsWithNoOwner { count: 2, .. }));
    }
}
