//! AWS SDK integration: one narrow capability trait per API family, plus the
//! SDK-backed implementations used in production.

/// IAM client wrapper
pub mod iam_client;

/// Organizations client wrapper
pub mod organizations_client;

/// resource group tagging client wrapper
pub mod tagging_client;

/// sts calls
pub mod sts;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{Account, Tags};
use crate::config::PayerConfig;

pub use iam_client::AwsIamClient;
pub use organizations_client::AwsOrganizationsClient;
pub use sts::AwsStsClient;
pub use tagging_client::AwsTaggingClient;

#[derive(Error, Debug)]
/// AWS Errors from AWS SDK calls
pub enum AwsError {
    #[error("AWS configuration error: {0}")]
    /// config error
    ConfigError(String),
    #[error("Organizations client error: {0}")]
    /// errors from calls to AWS Organizations
    OrganizationsError(String),
    #[error("Resource tagging client error: {0}")]
    /// errors from calls to the resource group tagging API
    TaggingError(String),
    #[error("IAM client error: {0}")]
    /// errors from calls to IAM
    IamError(String),
    #[error("AWS SDK error: {0}")]
    /// errors from SDK output
    SdkError(String),
}

/// Type of AWS Result extending Result
pub type AwsResult<T> = Result<T, AwsError>;

/// Account listing, tagging and placement
#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    /// All accounts directly under `parent_id`, in listing order
    async fn list_accounts_for_parent(&self, parent_id: &str) -> AwsResult<Vec<Account>>;

    /// ID of the OU or root currently holding the account
    async fn parent_of(&self, account_id: &str) -> AwsResult<String>;

    async fn list_tags(&self, account_id: &str) -> AwsResult<Tags>;

    /// Add or overwrite the given tags
    async fn tag_account(&self, account_id: &str, tags: &Tags) -> AwsResult<()>;

    /// Remove the given tag keys. Absent keys are not an error.
    async fn untag_account(&self, account_id: &str, keys: &[String]) -> AwsResult<()>;

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> AwsResult<()>;
}

/// Reverse lookup of resources by tag
#[async_trait]
pub trait TaggingApi: Send + Sync {
    /// ARNs of every Organizations account resource tagged `key=value`
    async fn find_resource_arns(&self, key: &str, value: &str) -> AwsResult<Vec<String>>;
}

/// Caller identity and cross-account sessions
#[async_trait]
pub trait StsApi: Send + Sync {
    /// Account the base credentials belong to
    async fn caller_account_id(&self) -> AwsResult<String>;

    /// Assume `role_arn` and return an IAM client bound to the resulting session
    async fn assume_role_for_iam(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> AwsResult<Box<dyn IamApi>>;
}

/// Role returned by `ListRoles`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RoleSummary {
    pub name: String,
    pub path: String,
}

/// Managed policy attached to a principal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AttachedPolicy {
    pub name: String,
    pub arn: String,
}

/// Customer managed policy in the account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicySummary {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyVersionSummary {
    pub version_id: String,
    pub is_default: bool,
}

/// Principals a managed policy is still attached to
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyEntities {
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub roles: Vec<String>,
}

/// IAM operations needed to empty an account of tenant principals
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn list_roles(&self) -> AwsResult<Vec<RoleSummary>>;
    async fn list_attached_role_policies(&self, role_name: &str) -> AwsResult<Vec<AttachedPolicy>>;
    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> AwsResult<()>;
    async fn list_role_policies(&self, role_name: &str) -> AwsResult<Vec<String>>;
    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<()>;
    async fn delete_role(&self, role_name: &str) -> AwsResult<()>;

    /// Customer managed (scope `Local`) policies only
    async fn list_local_policies(&self) -> AwsResult<Vec<PolicySummary>>;
    async fn list_policy_entities(&self, policy_arn: &str) -> AwsResult<PolicyEntities>;
    async fn detach_group_policy(&self, group_name: &str, policy_arn: &str) -> AwsResult<()>;
    async fn list_policy_versions(&self, policy_arn: &str) -> AwsResult<Vec<PolicyVersionSummary>>;
    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> AwsResult<()>;
    async fn delete_policy(&self, policy_arn: &str) -> AwsResult<()>;

    async fn list_users(&self) -> AwsResult<Vec<String>>;
    /// Returns `false` when the user had no login profile
    async fn delete_login_profile(&self, user_name: &str) -> AwsResult<bool>;
    async fn list_access_keys(&self, user_name: &str) -> AwsResult<Vec<String>>;
    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> AwsResult<()>;
    async fn list_signing_certificates(&self, user_name: &str) -> AwsResult<Vec<String>>;
    async fn delete_signing_certificate(&self, user_name: &str, certificate_id: &str) -> AwsResult<()>;
    async fn list_user_policies(&self, user_name: &str) -> AwsResult<Vec<String>>;
    async fn delete_user_policy(&self, user_name: &str, policy_name: &str) -> AwsResult<()>;
    async fn list_attached_user_policies(&self, user_name: &str) -> AwsResult<Vec<AttachedPolicy>>;
    async fn detach_user_policy(&self, user_name: &str, policy_arn: &str) -> AwsResult<()>;
    async fn list_groups_for_user(&self, user_name: &str) -> AwsResult<Vec<String>>;
    async fn remove_user_from_group(&self, user_name: &str, group_name: &str) -> AwsResult<()>;
    async fn delete_user(&self, user_name: &str) -> AwsResult<()>;
}

/// SDK-backed gateway for one payer: holds the Organizations, tagging and STS clients
pub struct CloudGateway {
    pub organizations: Box<dyn OrganizationsApi>,
    pub tagging: Box<dyn TaggingApi>,
    pub sts: Box<dyn StsApi>,
}

impl CloudGateway {
    /// Build the clients from the standard credential provider chain, using the
    /// payer's profile (when set) and region.
    ///
    /// # Errors
    /// `ConfigError` when no credentials provider could be resolved.
    pub async fn connect(payer: &PayerConfig) -> AwsResult<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(payer.region.clone()));
        if let Some(profile) = &payer.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        if config.credentials_provider().is_none() {
            return Err(AwsError::ConfigError(format!(
                "no AWS credentials provider for profile {}",
                payer.profile.as_deref().unwrap_or("default")
            )));
        }

        Ok(Self {
            organizations: Box::new(AwsOrganizationsClient::new(
                aws_sdk_organizations::Client::new(&config),
            )),
            tagging: Box::new(AwsTaggingClient::new(
                aws_sdk_resourcegroupstagging::Client::new(&config),
            )),
            sts: Box::new(AwsStsClient::new(aws_sdk_sts::Client::new(&config), config)),
        })
    }
}
