use async_trait::async_trait;
use aws_sdk_resourcegroupstagging::error::DisplayErrorContext;
use aws_sdk_resourcegroupstagging::types::TagFilter;
use aws_sdk_resourcegroupstagging::Client as TaggingClient;

use crate::aws::{AwsError, AwsResult, TaggingApi};

/// Resource type of Organizations member accounts in the tagging index
const ACCOUNT_RESOURCE_TYPE: &str = "organizations:account";

/// Client to call the AWS resource group tagging API
pub struct AwsTaggingClient {
    pub(crate) client: TaggingClient,
}

/// Impl for AWS resource group tagging client wrapper
impl AwsTaggingClient {
    /// New construct
    #[must_use]
    pub const fn new(client: TaggingClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaggingApi for AwsTaggingClient {
    /// List all matching account resources by calling and paginating get-resources
    async fn find_resource_arns(&self, key: &str, value: &str) -> AwsResult<Vec<String>> {
        let mut arns = Vec::<String>::new();
        let mut pagination_token: Option<String> = None;

        loop {
            let out = self
                .client
                .get_resources()
                .resource_type_filters(ACCOUNT_RESOURCE_TYPE)
                .tag_filters(TagFilter::builder().key(key).values(value).build())
                .set_pagination_token(pagination_token.take())
                .send()
                .await
                .map_err(|e| {
                    AwsError::TaggingError(format!(
                        "Failed to call get-resources for tag {key}={value}: {}",
                        DisplayErrorContext(e)
                    ))
                })?;

            arns.extend(
                out.resource_tag_mapping_list()
                    .iter()
                    .filter_map(|mapping| mapping.resource_arn().map(ToString::to_string)),
            );

            // An empty token marks the last page
            pagination_token = out
                .pagination_token()
                .filter(|token| !token.is_empty())
                .map(ToString::to_string);
            if pagination_token.is_none() {
                break;
            }
        }

        Ok(arns)
    }
}
