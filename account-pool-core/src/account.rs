//! Pool account model: status, tags and the claim state derived from them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};

/// Tag key holding the claiming user's name
pub const OWNER_TAG: &str = "owner";

/// Tag key marking an account as claimed
pub const CLAIMED_TAG: &str = "claimed";

/// Tag key holding the random token written by the allocator to verify its claim
pub const CLAIM_TOKEN_TAG: &str = "claim-token";

/// Width of an AWS account ID
pub const ACCOUNT_ID_LEN: usize = 12;

/// Account tags, keyed by tag key
pub type Tags = BTreeMap<String, String>;

/// Lifecycle status reported by AWS Organizations. Read-only for this crate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
    PendingClosure,
    Unknown(String),
}

impl AccountStatus {
    /// Map the Organizations wire value onto the enum
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "ACTIVE" => Self::Active,
            "SUSPENDED" => Self::Suspended,
            "PENDING_CLOSURE" => Self::PendingClosure,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::Suspended => f.write_str("SUSPENDED"),
            Self::PendingClosure => f.write_str("PENDING_CLOSURE"),
            Self::Unknown(value) => f.write_str(value),
        }
    }
}

/// An account listed under an organizational unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: AccountStatus,
}

impl Account {
    #[must_use]
    pub fn new(id: &str, status: AccountStatus) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            email: None,
            status,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Claim state derived from an account's tags.
///
/// `owner` and `claimed` are written and removed together. Seeing exactly one of
/// them means a claim or reclaim was interrupted; such accounts are never free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// Neither `owner` nor `claimed` is present
    Free,
    /// Both tags are present
    Claimed { owner: String },
    /// Exactly one of the two tags is present
    PartiallyTagged { owner: Option<String> },
}

impl ClaimState {
    /// Classify a tag set
    #[must_use]
    pub fn from_tags(tags: &Tags) -> Self {
        match (tags.get(OWNER_TAG), tags.contains_key(CLAIMED_TAG)) {
            (None, false) => Self::Free,
            (Some(owner), true) => Self::Claimed {
                owner: owner.clone(),
            },
            (owner, _) => Self::PartiallyTagged {
                owner: owner.cloned(),
            },
        }
    }

    /// Classify a tag set, logging partially tagged accounts as an anomaly
    #[must_use]
    pub fn observe(account_id: &str, tags: &Tags) -> Self {
        let state = Self::from_tags(tags);
        if let Self::PartiallyTagged { owner } = &state {
            warn!(
                "Account {account_id} is partially tagged (owner: {owner:?}, claimed: {}); treating it as not eligible",
                tags.contains_key(CLAIMED_TAG)
            );
        }
        state
    }

    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }

    /// Owner recorded on the account, if any
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        match self {
            Self::Free => None,
            Self::Claimed { owner } => Some(owner),
            Self::PartiallyTagged { owner } => owner.as_deref(),
        }
    }
}

fn account_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{12}$").expect("Valid regex pattern for account IDs"))
}

/// Validate that `account_id` is a 12 digit AWS account ID
pub fn validate_account_id(account_id: &str) -> PoolResult<()> {
    if account_id_pattern().is_match(account_id) {
        Ok(())
    } else {
        Err(PoolError::InvalidAccountId(account_id.to_string()))
    }
}

/// Extract the account ID from an Organizations account ARN.
///
/// The ID is the fixed-width suffix of the ARN, e.g.
/// `arn:aws:organizations::000000000000:account/o-abc/111111111111`.
#[must_use]
pub fn account_id_from_arn(arn: &str) -> Option<&str> {
    let start = arn.len().checked_sub(ACCOUNT_ID_LEN)?;
    let suffix = arn.get(start..)?;
    account_id_pattern().is_match(suffix).then_some(suffix)
}
