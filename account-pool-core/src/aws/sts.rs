//! STS helpers for caller identity and cross-account sessions

use std::time::SystemTime;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_iam::config::Credentials;
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use log::debug;

use crate::aws::{AwsError, AwsIamClient, AwsResult, IamApi, StsApi};

/// Provider name attached to credentials obtained through `AssumeRole`
const ASSUMED_ROLE_PROVIDER: &str = "account-pool-assume-role";

/// Return the current caller account ID using STS GetCallerIdentity.
///
/// This is used for the payer-account guardrail before reclaiming anything.
///
/// # Arguments
///
/// * `client` - STS client to use for the API call
pub async fn caller_account_id(client: &StsClient) -> AwsResult<String> {
    let out = client
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| AwsError::SdkError(format!("STS GetCallerIdentity failed: {e}")))?;
    let acct = out
        .account()
        .map(std::string::ToString::to_string)
        .ok_or_else(|| AwsError::SdkError("STS GetCallerIdentity missing Account".to_string()))?;
    Ok(acct)
}

/// STS client plus the SDK configuration assumed-role clients are derived from
pub struct AwsStsClient {
    client: StsClient,
    base_config: SdkConfig,
}

impl AwsStsClient {
    #[must_use]
    pub const fn new(client: StsClient, base_config: SdkConfig) -> Self {
        Self {
            client,
            base_config,
        }
    }
}

#[async_trait]
impl StsApi for AwsStsClient {
    async fn caller_account_id(&self) -> AwsResult<String> {
        caller_account_id(&self.client).await
    }

    async fn assume_role_for_iam(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_seconds: i32,
    ) -> AwsResult<Box<dyn IamApi>> {
        let out = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .duration_seconds(duration_seconds)
            .send()
            .await
            .map_err(|e| {
                AwsError::SdkError(format!(
                    "STS AssumeRole for {role_arn} failed: {}",
                    DisplayErrorContext(e)
                ))
            })?;

        let creds = out.credentials().ok_or_else(|| {
            AwsError::SdkError(format!("STS AssumeRole for {role_arn} returned no credentials"))
        })?;
        let expires_after = SystemTime::try_from(creds.expiration().to_owned()).ok();
        debug!("Assumed {role_arn} as session '{session_name}', expires {expires_after:?}");

        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            expires_after,
            ASSUMED_ROLE_PROVIDER,
        );
        let iam_config = aws_sdk_iam::config::Builder::from(&self.base_config)
            .credentials_provider(credentials)
            .build();

        Ok(Box::new(AwsIamClient::new(IamClient::from_conf(iam_config))))
    }
}
