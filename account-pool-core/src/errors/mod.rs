//! Error handling module

use thiserror::Error;

use crate::aws::AwsError;
use crate::reclaim::AccountReport;

/// Result type alias for operations that can fail with `PoolError`
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Error type for pool allocation, ownership lookup and reclamation.
///
/// Variants without a source are resolution or policy outcomes and are meant to be
/// shown to the operator verbatim.
#[derive(Error, Debug)]
pub enum PoolError {
    /// Underlying AWS call failed
    #[error("AWS operation failed: {0}")]
    Aws(#[from] AwsError),

    /// The pool OU has no accounts at all
    #[error("No accounts found under root OU '{parent_id}'")]
    NoAccountsInRoot {
        /// OU that was listed
        parent_id: String,
    },

    /// Every account in the pool is claimed, partially tagged or not active
    #[error("No untagged accounts available under '{parent_id}'")]
    NoUntaggedAccounts {
        /// OU that was scanned
        parent_id: String,
    },

    /// The account has an empty tag set
    #[error("No tags on account {account_id}")]
    NoTagsOnAccount {
        /// Account that was read
        account_id: String,
    },

    /// The account has tags, but no `owner` tag
    #[error("No owner tag on account {account_id}")]
    NoOwnerTag {
        /// Account that was read
        account_id: String,
    },

    /// The reverse tag search matched nothing
    #[error("No resources tagged with owner '{user}'")]
    NoResources {
        /// Owner that was searched
        user: String,
    },

    /// Resources matched but none of them is an account
    #[error("No accounts found for user '{user}'")]
    NoAccountsForUser {
        /// Owner that was searched
        user: String,
    },

    /// The OU has no accounts
    #[error("No accounts found for parent '{parent_id}'")]
    NoAccountsForParent {
        /// OU that was listed
        parent_id: String,
    },

    /// The OU has accounts but none of them has an owner
    #[error("None of the {count} accounts under '{parent_id}' has an owner tag")]
    AccountsWithNoOwner {
        /// OU that was listed
        parent_id: String,
        /// Number of unowned accounts found
        count: usize,
    },

    /// Target is owned by a system identity and must not be reclaimed
    #[error("Refusing to reclaim account {account_id}: owner '{owner}' is a protected system identity")]
    ProtectedOwner {
        /// Account being reclaimed, or `-` when the username itself was rejected
        account_id: String,
        /// Offending owner
        owner: String,
    },

    /// Target is the payer account the session runs in
    #[error("Refusing to reclaim account {account_id}: it is the payer account")]
    PayerAccountTarget {
        /// Payer account ID
        account_id: String,
    },

    /// Target sits outside the payer's pool OUs
    #[error("Refusing to reclaim account {account_id}: it is under '{parent_id}', outside the pool")]
    NotInPool {
        /// Account being reclaimed
        account_id: String,
        /// Its current parent
        parent_id: String,
    },

    /// A specific account was requested but is not free and active
    #[error("Account {account_id} is not eligible for allocation: {reason}")]
    AccountNotEligible {
        /// Account that was requested
        account_id: String,
        /// Why it was rejected
        reason: String,
    },

    /// A concurrent writer claimed the account first
    #[error("Account {account_id} was claimed concurrently; claim rejected")]
    ClaimConflict {
        /// Contested account
        account_id: String,
    },

    /// Input that is not a 12 digit account ID
    #[error("Invalid account ID '{0}': expected 12 digits")]
    InvalidAccountId(String),

    /// Payer not present in configuration
    #[error("Unknown payer account '{payer}'. Known payers: {known}")]
    UnknownPayer {
        /// Requested payer
        payer: String,
        /// Comma separated configured payers
        known: String,
    },

    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    Configuration {
        /// Detailed error message about the configuration issue
        message: String,
        /// Optional underlying error that caused the configuration failure
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Reclamation attempted every artifact but some deletions failed
    #[error("Teardown incomplete: {failed} artifact(s) could not be removed")]
    TeardownIncomplete {
        /// Number of failed artifacts across all accounts
        failed: usize,
        /// Per-account outcomes, for display and manual cleanup
        reports: Vec<AccountReport>,
    },

    /// Untag, move or assume-role failed part way through a batch
    #[error("Reclamation stopped at account {account_id} after {} account(s) were torn down", .reports.len())]
    ReclaimAborted {
        /// Account whose fail-fast step failed
        account_id: String,
        /// The failure
        #[source]
        source: Box<PoolError>,
        /// Reports of the accounts finished before the failure
        reports: Vec<AccountReport>,
    },
}

impl PoolError {
    /// Create a configuration error
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub(crate) fn configuration_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a protected-owner error
    pub(crate) fn protected_owner(account_id: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::ProtectedOwner {
            account_id: account_id.into(),
            owner: owner.into(),
        }
    }

    /// Build the teardown error from the reports of a finished reclamation
    pub(crate) fn teardown_incomplete(reports: Vec<AccountReport>) -> Self {
        let failed = reports.iter().map(AccountReport::failed_count).sum();
        Self::TeardownIncomplete { failed, reports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_owner_error_creation() {
        let error = PoolError::protected_owner("111111111111", "hivesomething");

        assert!(matches!(error, PoolError::ProtectedOwner { .. }));
        assert!(error.to_string().contains("111111111111"));
        assert!(error.to_string().contains("hivesomething"));
    }

    #[test]
    fn test_aws_error_conversion() {
        let aws_error = AwsError::ConfigError("Test config error".to_string());
        let pool_error = PoolError::from(aws_error);
        assert!(pool_error.to_string().contains("AWS operation failed"));
    }
}
