//! Per-artifact outcomes of an account teardown.

use std::fmt;

use log::{info, warn};
use serde::Serialize;

/// Kind of IAM artifact the teardown acted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ArtifactKind {
    Role,
    RolePolicyAttachment,
    RoleInlinePolicy,
    Policy,
    PolicyVersion,
    PolicyAttachment,
    LoginProfile,
    AccessKey,
    SigningCertificate,
    UserInlinePolicy,
    UserPolicyAttachment,
    GroupMembership,
    User,
    /// A top level listing (roles, users, local policies) that failed
    Listing,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Role => "role",
            Self::RolePolicyAttachment => "role policy attachment",
            Self::RoleInlinePolicy => "role inline policy",
            Self::Policy => "policy",
            Self::PolicyVersion => "policy version",
            Self::PolicyAttachment => "policy attachment",
            Self::LoginProfile => "login profile",
            Self::AccessKey => "access key",
            Self::SigningCertificate => "signing certificate",
            Self::UserInlinePolicy => "user inline policy",
            Self::UserPolicyAttachment => "user policy attachment",
            Self::GroupMembership => "group membership",
            Self::User => "user",
            Self::Listing => "listing",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Status", content = "Reason")]
pub enum ArtifactStatus {
    Succeeded,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactOutcome {
    pub kind: ArtifactKind,
    /// Artifact identifier, `<principal>/<child>` for dependents
    pub name: String,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}

/// Everything the teardown did inside one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountReport {
    pub account_id: String,
    pub owner: Option<String>,
    pub artifacts: Vec<ArtifactOutcome>,
}

impl AccountReport {
    #[must_use]
    pub fn new(account_id: impl Into<String>, owner: Option<String>) -> Self {
        Self {
            account_id: account_id.into(),
            owner,
            artifacts: Vec::new(),
        }
    }

    fn push(&mut self, kind: ArtifactKind, name: impl Into<String>, status: ArtifactStatus) {
        self.artifacts.push(ArtifactOutcome {
            kind,
            name: name.into(),
            status,
        });
    }

    pub fn succeeded(&mut self, kind: ArtifactKind, name: impl Into<String>) {
        let name = name.into();
        info!("[{}] Deleted {kind} {name}", self.account_id);
        self.push(kind, name, ArtifactStatus::Succeeded);
    }

    pub fn skipped(&mut self, kind: ArtifactKind, name: impl Into<String>, reason: impl Into<String>) {
        let (name, reason) = (name.into(), reason.into());
        info!("[{}] Skipped {kind} {name}: {reason}", self.account_id);
        self.push(kind, name, ArtifactStatus::Skipped(reason));
    }

    pub fn failed(&mut self, kind: ArtifactKind, name: impl Into<String>, reason: impl fmt::Display) {
        let (name, reason) = (name.into(), reason.to_string());
        warn!("[{}] Failed to delete {kind} {name}: {reason}", self.account_id);
        self.push(kind, name, ArtifactStatus::Failed(reason));
    }

    /// Record the result of one delete call; returns whether it succeeded
    pub fn record<E: fmt::Display>(
        &mut self,
        kind: ArtifactKind,
        name: impl Into<String>,
        result: Result<(), E>,
    ) -> bool {
        match result {
            Ok(()) => {
                self.succeeded(kind, name);
                true
            }
            Err(e) => {
                self.failed(kind, name, e);
                false
            }
        }
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ArtifactOutcome> {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.status, ArtifactStatus::Failed(_)))
    }

    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| a.status == ArtifactStatus::Succeeded)
            .count()
    }

    /// No artifact failed
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0
    }
}
