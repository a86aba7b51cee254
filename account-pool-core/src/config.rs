//! Pool configuration: payer OU layout and engine settings.
//!
//! The configuration is resolved once at startup and handed explicitly to the
//! allocator and the reclaimer. Without a configuration file the built-in payers
//! are used; a file replaces them entirely.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{PoolError, PoolResult};

/// Role every pool account trusts from its payer
pub const DEFAULT_ADMIN_ROLE: &str = "OrganizationAccountAccessRole";

/// Region the payer clients are built for. Organizations is served from us-east-1.
pub const DEFAULT_REGION: &str = "us-east-1";

/// OU layout and credentials for one payer (organization management account)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PayerConfig {
    /// Root holding free accounts
    pub root_ou_id: String,
    /// OU holding claimed accounts
    pub claimed_ou_id: String,
    /// Named AWS profile for the payer; default credential chain when unset
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
}

/// Reclamation settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReclaimSettings {
    /// Cross-account role assumed inside the target account; never deleted
    pub admin_role_name: String,
    /// Prefix of the STS session name, suffixed with a timestamp
    pub session_name_prefix: String,
    pub session_duration_seconds: i32,
    /// Owners starting with one of these prefixes are system identities
    pub protected_owner_prefixes: Vec<String>,
    /// Additional roles that are never deleted
    pub protected_role_names: Vec<String>,
}

impl Default for ReclaimSettings {
    fn default() -> Self {
        Self {
            admin_role_name: DEFAULT_ADMIN_ROLE.to_string(),
            session_name_prefix: "account-pool-reclaim".to_string(),
            session_duration_seconds: 900,
            protected_owner_prefixes: vec!["hive".to_string()],
            protected_role_names: Vec::new(),
        }
    }
}

impl ReclaimSettings {
    /// Whether `owner` names a system identity that must never be reclaimed
    #[must_use]
    pub fn is_protected_owner(&self, owner: &str) -> bool {
        self.protected_owner_prefixes
            .iter()
            .any(|prefix| owner.starts_with(prefix.as_str()))
    }
}

/// Allocation settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocationSettings {
    /// Wait between writing a claim and reading it back
    pub claim_settle_millis: u64,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            claim_settle_millis: 2000,
        }
    }
}

impl AllocationSettings {
    #[must_use]
    pub const fn claim_settle(&self) -> Duration {
        Duration::from_millis(self.claim_settle_millis)
    }
}

/// Top level configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PoolConfig {
    pub payers: BTreeMap<String, PayerConfig>,
    #[serde(default)]
    pub reclaim: ReclaimSettings,
    #[serde(default)]
    pub allocation: AllocationSettings,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn builtin_payer(root_ou_id: &str, claimed_ou_id: &str, profile: &str) -> PayerConfig {
    PayerConfig {
        root_ou_id: root_ou_id.to_string(),
        claimed_ou_id: claimed_ou_id.to_string(),
        profile: Some(profile.to_string()),
        region: default_region(),
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let payers = BTreeMap::from([
            (
                "osd-staging-1".to_string(),
                builtin_payer("r-0wd6", "ou-0wd6-z6tzkjek", "osd-staging-1"),
            ),
            (
                "osd-staging-2".to_string(),
                builtin_payer("r-rs3h", "ou-rs3h-i0v69q47", "osd-staging-2"),
            ),
        ]);
        Self {
            payers,
            reclaim: ReclaimSettings::default(),
            allocation: AllocationSettings::default(),
        }
    }
}

impl PoolConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> PoolResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            PoolError::configuration_with_source("Failed to parse pool configuration JSON", e)
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file at `path`
    pub fn from_file(path: &Path) -> PoolResult<Self> {
        debug!("Loading pool configuration from {}", path.display());
        let json = std::fs::read_to_string(path).map_err(|e| {
            PoolError::configuration_with_source(
                format!("Failed to read configuration file '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json(&json)
    }

    /// Load `path` when given, otherwise the built-in configuration
    pub fn load(path: Option<&Path>) -> PoolResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    fn validate(&self) -> PoolResult<()> {
        if self.payers.is_empty() {
            return Err(PoolError::configuration("no payers configured"));
        }
        for (name, payer) in &self.payers {
            if payer.root_ou_id.is_empty() || payer.claimed_ou_id.is_empty() {
                return Err(PoolError::configuration(format!(
                    "payer '{name}' must set both RootOuId and ClaimedOuId"
                )));
            }
            if payer.root_ou_id == payer.claimed_ou_id {
                return Err(PoolError::configuration(format!(
                    "payer '{name}' uses the same OU for free and claimed accounts"
                )));
            }
        }
        let duration = self.reclaim.session_duration_seconds;
        if !(900..=43200).contains(&duration) {
            return Err(PoolError::configuration(format!(
                "SessionDurationSeconds must be between 900 and 43200, got {duration}"
            )));
        }
        Ok(())
    }

    /// Resolve a payer by name
    pub fn payer(&self, name: &str) -> PoolResult<&PayerConfig> {
        self.payers.get(name).ok_or_else(|| PoolError::UnknownPayer {
            payer: name.to_string(),
            known: self.payers.keys().cloned().collect::<Vec<_>>().join(", "),
        })
    }
}
