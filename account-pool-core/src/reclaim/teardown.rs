//! IAM teardown inside a reclaimed account.
//!
//! Roles go first, then the customer managed policies they may have pinned, then
//! users. Every artifact is attempted even when an earlier one failed; the outcome
//! of each call lands in the [`AccountReport`].

use std::collections::BTreeSet;

use log::debug;

use super::report::{AccountReport, ArtifactKind};
use crate::aws::{IamApi, PolicySummary, RoleSummary};
use crate::config::ReclaimSettings;

/// Path IAM puts every service-linked role under
const SERVICE_ROLE_PATH: &str = "/aws-service-role/";
const SERVICE_LINKED_PREFIX: &str = "AWSServiceRoleFor";

fn is_protected_role_name(name: &str, settings: &ReclaimSettings) -> bool {
    name == settings.admin_role_name
        || name.starts_with(SERVICE_LINKED_PREFIX)
        || settings.protected_role_names.iter().any(|n| n == name)
}

/// Roles the teardown never touches: the admin role it runs as, service-linked
/// roles and the configured extras
#[must_use]
pub fn is_protected_role(role: &RoleSummary, settings: &ReclaimSettings) -> bool {
    role.path.starts_with(SERVICE_ROLE_PATH) || is_protected_role_name(&role.name, settings)
}

pub struct Teardown<'a> {
    iam: &'a dyn IamApi,
    settings: &'a ReclaimSettings,
}

impl<'a> Teardown<'a> {
    #[must_use]
    pub fn new(iam: &'a dyn IamApi, settings: &'a ReclaimSettings) -> Self {
        Self { iam, settings }
    }

    pub async fn run(&self, report: &mut AccountReport) {
        let kept_roles = self.remove_roles(report).await;
        self.remove_local_policies(&kept_roles, report).await;
        self.remove_users(report).await;
    }

    /// Delete every unprotected role; returns the names of the protected ones
    async fn remove_roles(&self, report: &mut AccountReport) -> BTreeSet<String> {
        let mut kept = BTreeSet::new();
        let roles = match self.iam.list_roles().await {
            Ok(roles) => roles,
            Err(e) => {
                report.failed(ArtifactKind::Listing, "roles", e);
                return kept;
            }
        };

        for role in roles {
            if is_protected_role(&role, self.settings) {
                debug!("Keeping protected role {}{}", role.path, role.name);
                kept.insert(role.name);
                continue;
            }
            self.remove_role(&role.name, report).await;
        }
        kept
    }

    async fn remove_role(&self, role: &str, report: &mut AccountReport) {
        let mut blocked = None;

        match self.iam.list_attached_role_policies(role).await {
            Ok(attached) => {
                for policy in attached {
                    let result = self.iam.detach_role_policy(role, &policy.arn).await;
                    report.record(
                        ArtifactKind::RolePolicyAttachment,
                        format!("{role}/{}", policy.name),
                        result,
                    );
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{role}/attached policies"), e);
                blocked = Some("could not list attached policies");
            }
        }

        match self.iam.list_role_policies(role).await {
            Ok(inline) => {
                for policy in inline {
                    let result = self.iam.delete_role_policy(role, &policy).await;
                    report.record(ArtifactKind::RoleInlinePolicy, format!("{role}/{policy}"), result);
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{role}/inline policies"), e);
                blocked = Some("could not list inline policies");
            }
        }

        match blocked {
            Some(reason) => report.skipped(ArtifactKind::Role, role, reason),
            None => {
                let result = self.iam.delete_role(role).await;
                report.record(ArtifactKind::Role, role, result);
            }
        }
    }

    async fn remove_local_policies(&self, kept_roles: &BTreeSet<String>, report: &mut AccountReport) {
        let policies = match self.iam.list_local_policies().await {
            Ok(policies) => policies,
            Err(e) => {
                report.failed(ArtifactKind::Listing, "local policies", e);
                return;
            }
        };

        for policy in &policies {
            self.remove_policy(policy, kept_roles, report).await;
        }
    }

    async fn remove_policy(
        &self,
        policy: &PolicySummary,
        kept_roles: &BTreeSet<String>,
        report: &mut AccountReport,
    ) {
        let name = policy.name.as_str();
        let arn = policy.arn.as_str();

        let entities = match self.iam.list_policy_entities(arn).await {
            Ok(entities) => entities,
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{name}/entities"), e);
                report.skipped(ArtifactKind::Policy, name, "could not list attached entities");
                return;
            }
        };

        // A policy pinned by a role we keep stays with it
        if let Some(role) = entities
            .roles
            .iter()
            .find(|r| kept_roles.contains(*r) || is_protected_role_name(r, self.settings))
        {
            report.skipped(
                ArtifactKind::Policy,
                name,
                format!("attached to protected role {role}"),
            );
            return;
        }

        for user in &entities.users {
            let result = self.iam.detach_user_policy(user, arn).await;
            report.record(ArtifactKind::PolicyAttachment, format!("{name}/user/{user}"), result);
        }
        for group in &entities.groups {
            let result = self.iam.detach_group_policy(group, arn).await;
            report.record(ArtifactKind::PolicyAttachment, format!("{name}/group/{group}"), result);
        }
        for role in &entities.roles {
            let result = self.iam.detach_role_policy(role, arn).await;
            report.record(ArtifactKind::PolicyAttachment, format!("{name}/role/{role}"), result);
        }

        match self.iam.list_policy_versions(arn).await {
            Ok(versions) => {
                for version in versions.iter().filter(|v| !v.is_default) {
                    let result = self.iam.delete_policy_version(arn, &version.version_id).await;
                    report.record(
                        ArtifactKind::PolicyVersion,
                        format!("{name}/{}", version.version_id),
                        result,
                    );
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{name}/versions"), e);
                report.skipped(ArtifactKind::Policy, name, "could not list policy versions");
                return;
            }
        }

        let result = self.iam.delete_policy(arn).await;
        report.record(ArtifactKind::Policy, name, result);
    }

    async fn remove_users(&self, report: &mut AccountReport) {
        let users = match self.iam.list_users().await {
            Ok(users) => users,
            Err(e) => {
                report.failed(ArtifactKind::Listing, "users", e);
                return;
            }
        };

        for user in &users {
            self.remove_user(user, report).await;
        }
    }

    /// Strip a user of its dependents in the order IAM requires, then delete it
    async fn remove_user(&self, user: &str, report: &mut AccountReport) {
        let mut blocked = None;

        match self.iam.delete_login_profile(user).await {
            Ok(true) => report.succeeded(ArtifactKind::LoginProfile, user),
            Ok(false) => report.skipped(ArtifactKind::LoginProfile, user, "no login profile"),
            Err(e) => report.failed(ArtifactKind::LoginProfile, user, e),
        }

        match self.iam.list_access_keys(user).await {
            Ok(keys) => {
                for key in keys {
                    let result = self.iam.delete_access_key(user, &key).await;
                    report.record(ArtifactKind::AccessKey, format!("{user}/{key}"), result);
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{user}/access keys"), e);
                blocked = Some("could not list access keys");
            }
        }

        match self.iam.list_signing_certificates(user).await {
            Ok(certificates) => {
                for certificate in certificates {
                    let result = self.iam.delete_signing_certificate(user, &certificate).await;
                    report.record(
                        ArtifactKind::SigningCertificate,
                        format!("{user}/{certificate}"),
                        result,
                    );
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{user}/signing certificates"), e);
                blocked = Some("could not list signing certificates");
            }
        }

        match self.iam.list_user_policies(user).await {
            Ok(inline) => {
                for policy in inline {
                    let result = self.iam.delete_user_policy(user, &policy).await;
                    report.record(ArtifactKind::UserInlinePolicy, format!("{user}/{policy}"), result);
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{user}/inline policies"), e);
                blocked = Some("could not list inline policies");
            }
        }

        match self.iam.list_attached_user_policies(user).await {
            Ok(attached) => {
                for policy in attached {
                    let result = self.iam.detach_user_policy(user, &policy.arn).await;
                    report.record(
                        ArtifactKind::UserPolicyAttachment,
                        format!("{user}/{}", policy.name),
                        result,
                    );
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{user}/attached policies"), e);
                blocked = Some("could not list attached policies");
            }
        }

        match self.iam.list_groups_for_user(user).await {
            Ok(groups) => {
                for group in groups {
                    let result = self.iam.remove_user_from_group(user, &group).await;
                    report.record(ArtifactKind::GroupMembership, format!("{user}/{group}"), result);
                }
            }
            Err(e) => {
                report.failed(ArtifactKind::Listing, format!("{user}/groups"), e);
                blocked = Some("could not list groups");
            }
        }

        match blocked {
            Some(reason) => report.skipped(ArtifactKind::User, user, reason),
            None => {
                let result = self.iam.delete_user(user).await;
                report.record(ArtifactKind::User, user, result);
            }
        }
    }
}
