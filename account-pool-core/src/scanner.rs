//! Pool scanner: accounts under an OU and their tags.

use log::trace;

use crate::account::{Account, ClaimState, Tags};
use crate::aws::OrganizationsApi;
use crate::errors::{PoolError, PoolResult};

/// Read-only view over the accounts of a pool
pub struct PoolScanner<'a> {
    organizations: &'a dyn OrganizationsApi,
}

impl<'a> PoolScanner<'a> {
    #[must_use]
    pub fn new(organizations: &'a dyn OrganizationsApi) -> Self {
        Self { organizations }
    }

    /// Accounts directly under `parent_ou`, in listing order.
    ///
    /// # Errors
    /// `NoAccountsInRoot` when the OU is empty.
    pub async fn list_pool_accounts(&self, parent_ou: &str) -> PoolResult<Vec<Account>> {
        let accounts = self
            .organizations
            .list_accounts_for_parent(parent_ou)
            .await?;
        if accounts.is_empty() {
            return Err(PoolError::NoAccountsInRoot {
                parent_id: parent_ou.to_string(),
            });
        }
        trace!("Pool {parent_ou} holds {} accounts", accounts.len());
        Ok(accounts)
    }

    pub async fn list_tags(&self, account_id: &str) -> PoolResult<Tags> {
        Ok(self.organizations.list_tags(account_id).await?)
    }

    /// Read the account's tags and classify them
    pub async fn claim_state(&self, account_id: &str) -> PoolResult<ClaimState> {
        let tags = self.list_tags(account_id).await?;
        Ok(ClaimState::observe(account_id, &tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;
    use crate::testing::InMemoryOrganizations;

    #[tokio::test]
    async fn test_list_pool_accounts_empty_root() {
        let orgs = InMemoryOrganizations::new();
        let scanner = PoolScanner::new(&orgs);

        let err = scanner.list_pool_accounts("r-0wd6").await.unwrap_err();
        assert!(matches!(err, PoolError::NoAccountsInRoot { parent_id } if parent_id == "r-0wd6"));
    }

    #[tokio::test]
    async fn test_list_pool_accounts_keeps_listing_order() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account("r-0wd6", "333333333333", AccountStatus::Active, &[]);
        orgs.add_account("r-0wd6", "111111111111", AccountStatus::Suspended, &[]);
        let scanner = PoolScanner::new(&orgs);

        let ids: Vec<String> = scanner
            .list_pool_accounts("r-0wd6")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["333333333333", "111111111111"]);
    }

    #[tokio::test]
    async fn test_claim_state_reads_tags() {
        let orgs = InMemoryOrganizations::new();
        orgs.add_account(
            "ou-claimed",
            "111111111111",
            AccountStatus::Active,
            &[("owner", "alice"), ("claimed", "true")],
        );
        let scanner = PoolScanner::new(&orgs);

        let state = scanner.claim_state("111111111111").await.unwrap();
        assert_eq!(state.owner(), Some("alice"));
    }
}
