use async_trait::async_trait;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::PolicyScopeType;
use aws_sdk_iam::Client as IamClient;

use crate::aws::{
    AttachedPolicy, AwsError, AwsResult, IamApi, PolicyEntities, PolicySummary,
    PolicyVersionSummary, RoleSummary,
};

/// IAM client, usually bound to an assumed-role session in a pool account
pub struct AwsIamClient {
    client: IamClient,
}

impl AwsIamClient {
    #[must_use]
    pub const fn new(client: IamClient) -> Self {
        Self { client }
    }
}

fn iam_error(operation: &str, target: &str, e: impl std::error::Error) -> AwsError {
    AwsError::IamError(format!(
        "{operation} failed for '{target}': {}",
        DisplayErrorContext(e)
    ))
}

fn attached(policies: &[aws_sdk_iam::types::AttachedPolicy]) -> impl Iterator<Item = AttachedPolicy> + '_ {
    policies.iter().filter_map(|p| {
        Some(AttachedPolicy {
            name: p.policy_name()?.to_string(),
            arn: p.policy_arn()?.to_string(),
        })
    })
}

#[async_trait]
impl IamApi for AwsIamClient {
    async fn list_roles(&self) -> AwsResult<Vec<RoleSummary>> {
        let mut roles = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_roles()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListRoles", "account", e))?;

            roles.extend(out.roles().iter().map(|r| RoleSummary {
                name: r.role_name().to_string(),
                path: r.path().to_string(),
            }));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(roles)
    }

    async fn list_attached_role_policies(&self, role_name: &str) -> AwsResult<Vec<AttachedPolicy>> {
        let mut policies = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_attached_role_policies()
                .role_name(role_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListAttachedRolePolicies", role_name, e))?;

            policies.extend(attached(out.attached_policies()));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(policies)
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> AwsResult<()> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| iam_error("DetachRolePolicy", role_name, e))?;
        Ok(())
    }

    async fn list_role_policies(&self, role_name: &str) -> AwsResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_role_policies()
                .role_name(role_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListRolePolicies", role_name, e))?;

            names.extend(out.policy_names().iter().cloned());

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(names)
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<()> {
        self.client
            .delete_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| iam_error("DeleteRolePolicy", role_name, e))?;
        Ok(())
    }

    async fn delete_role(&self, role_name: &str) -> AwsResult<()> {
        self.client
            .delete_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| iam_error("DeleteRole", role_name, e))?;
        Ok(())
    }

    async fn list_local_policies(&self) -> AwsResult<Vec<PolicySummary>> {
        let mut policies = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_policies()
                .scope(PolicyScopeType::Local)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListPolicies", "account", e))?;

            policies.extend(out.policies().iter().filter_map(|p| {
                Some(PolicySummary {
                    name: p.policy_name()?.to_string(),
                    arn: p.arn()?.to_string(),
                })
            }));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(policies)
    }

    async fn list_policy_entities(&self, policy_arn: &str) -> AwsResult<PolicyEntities> {
        let mut entities = PolicyEntities::default();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_entities_for_policy()
                .policy_arn(policy_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListEntitiesForPolicy", policy_arn, e))?;

            entities.users.extend(
                out.policy_users()
                    .iter()
                    .filter_map(|u| u.user_name().map(ToString::to_string)),
            );
            entities.groups.extend(
                out.policy_groups()
                    .iter()
                    .filter_map(|g| g.group_name().map(ToString::to_string)),
            );
            entities.roles.extend(
                out.policy_roles()
                    .iter()
                    .filter_map(|r| r.role_name().map(ToString::to_string)),
            );

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(entities)
    }

    async fn detach_group_policy(&self, group_name: &str, policy_arn: &str) -> AwsResult<()> {
        self.client
            .detach_group_policy()
            .group_name(group_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| iam_error("DetachGroupPolicy", group_name, e))?;
        Ok(())
    }

    async fn list_policy_versions(&self, policy_arn: &str) -> AwsResult<Vec<PolicyVersionSummary>> {
        let mut versions = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_policy_versions()
                .policy_arn(policy_arn)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListPolicyVersions", policy_arn, e))?;

            versions.extend(out.versions().iter().filter_map(|v| {
                Some(PolicyVersionSummary {
                    version_id: v.version_id()?.to_string(),
                    is_default: v.is_default_version(),
                })
            }));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(versions)
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> AwsResult<()> {
        self.client
            .delete_policy_version()
            .policy_arn(policy_arn)
            .version_id(version_id)
            .send()
            .await
            .map_err(|e| iam_error("DeletePolicyVersion", policy_arn, e))?;
        Ok(())
    }

    async fn delete_policy(&self, policy_arn: &str) -> AwsResult<()> {
        self.client
            .delete_policy()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| iam_error("DeletePolicy", policy_arn, e))?;
        Ok(())
    }

    async fn list_users(&self) -> AwsResult<Vec<String>> {
        let mut users = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_users()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListUsers", "account", e))?;

            users.extend(out.users().iter().map(|u| u.user_name().to_string()));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(users)
    }

    async fn delete_login_profile(&self, user_name: &str) -> AwsResult<bool> {
        match self
            .client
            .delete_login_profile()
            .user_name(user_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_no_such_entity_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(iam_error("DeleteLoginProfile", user_name, e)),
        }
    }

    async fn list_access_keys(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_access_keys()
                .user_name(user_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListAccessKeys", user_name, e))?;

            keys.extend(
                out.access_key_metadata()
                    .iter()
                    .filter_map(|k| k.access_key_id().map(ToString::to_string)),
            );

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(keys)
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> AwsResult<()> {
        self.client
            .delete_access_key()
            .user_name(user_name)
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| iam_error("DeleteAccessKey", access_key_id, e))?;
        Ok(())
    }

    async fn list_signing_certificates(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut certificates = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_signing_certificates()
                .user_name(user_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListSigningCertificates", user_name, e))?;

            certificates.extend(
                out.certificates()
                    .iter()
                    .map(|c| c.certificate_id().to_string()),
            );

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(certificates)
    }

    async fn delete_signing_certificate(&self, user_name: &str, certificate_id: &str) -> AwsResult<()> {
        self.client
            .delete_signing_certificate()
            .user_name(user_name)
            .certificate_id(certificate_id)
            .send()
            .await
            .map_err(|e| iam_error("DeleteSigningCertificate", certificate_id, e))?;
        Ok(())
    }

    async fn list_user_policies(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut names = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_user_policies()
                .user_name(user_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListUserPolicies", user_name, e))?;

            names.extend(out.policy_names().iter().cloned());

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(names)
    }

    async fn delete_user_policy(&self, user_name: &str, policy_name: &str) -> AwsResult<()> {
        self.client
            .delete_user_policy()
            .user_name(user_name)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| iam_error("DeleteUserPolicy", user_name, e))?;
        Ok(())
    }

    async fn list_attached_user_policies(&self, user_name: &str) -> AwsResult<Vec<AttachedPolicy>> {
        let mut policies = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_attached_user_policies()
                .user_name(user_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListAttachedUserPolicies", user_name, e))?;

            policies.extend(attached(out.attached_policies()));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(policies)
    }

    async fn detach_user_policy(&self, user_name: &str, policy_arn: &str) -> AwsResult<()> {
        self.client
            .detach_user_policy()
            .user_name(user_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| iam_error("DetachUserPolicy", user_name, e))?;
        Ok(())
    }

    async fn list_groups_for_user(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut groups = Vec::new();
        let mut marker = None;

        loop {
            let out = self
                .client
                .list_groups_for_user()
                .user_name(user_name)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| iam_error("ListGroupsForUser", user_name, e))?;

            groups.extend(out.groups().iter().map(|g| g.group_name().to_string()));

            marker = out.marker().map(ToString::to_string);
            if !out.is_truncated() {
                break;
            }
        }

        Ok(groups)
    }

    async fn remove_user_from_group(&self, user_name: &str, group_name: &str) -> AwsResult<()> {
        self.client
            .remove_user_from_group()
            .user_name(user_name)
            .group_name(group_name)
            .send()
            .await
            .map_err(|e| iam_error("RemoveUserFromGroup", user_name, e))?;
        Ok(())
    }

    async fn delete_user(&self, user_name: &str) -> AwsResult<()> {
        self.client
            .delete_user()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| iam_error("DeleteUser", user_name, e))?;
        Ok(())
    }
}
