use async_trait::async_trait;
use aws_sdk_organizations::error::DisplayErrorContext;
use aws_sdk_organizations::types::Tag;
use aws_sdk_organizations::Client as OrganizationsClient;
use log::trace;

use crate::account::{Account, AccountStatus, Tags};
use crate::aws::{AwsError, AwsResult, OrganizationsApi};

/// Client to call AWS Organizations
pub struct AwsOrganizationsClient {
    pub(crate) client: OrganizationsClient,
}

impl AwsOrganizationsClient {
    /// New construct
    #[must_use]
    pub const fn new(client: OrganizationsClient) -> Self {
        Self { client }
    }
}

fn organizations_error(operation: &str, target: &str, e: impl std::error::Error) -> AwsError {
    AwsError::OrganizationsError(format!(
        "Failed to call {operation} for '{target}': {}",
        DisplayErrorContext(e)
    ))
}

#[async_trait]
impl OrganizationsApi for AwsOrganizationsClient {
    async fn list_accounts_for_parent(&self, parent_id: &str) -> AwsResult<Vec<Account>> {
        let mut accounts = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let out = self
                .client
                .list_accounts_for_parent()
                .parent_id(parent_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| organizations_error("list-accounts-for-parent", parent_id, e))?;

            for account in out.accounts() {
                let Some(id) = account.id() else {
                    continue;
                };
                let status = account.status().map_or_else(
                    || AccountStatus::Unknown("UNSET".to_string()),
                    |s| AccountStatus::from_wire(s.as_str()),
                );
                accounts.push(Account {
                    id: id.to_string(),
                    name: account.name().map(ToString::to_string),
                    email: account.email().map(ToString::to_string),
                    status,
                });
            }

            next_token = out.next_token().map(ToString::to_string);
            if next_token.is_none() {
                break;
            }
        }

        trace!("Listed {} accounts under {parent_id}", accounts.len());
        Ok(accounts)
    }

    async fn parent_of(&self, account_id: &str) -> AwsResult<String> {
        let out = self
            .client
            .list_parents()
            .child_id(account_id)
            .send()
            .await
            .map_err(|e| organizations_error("list-parents", account_id, e))?;

        out.parents()
            .iter()
            .find_map(|p| p.id().map(ToString::to_string))
            .ok_or_else(|| {
                AwsError::OrganizationsError(format!("Account {account_id} has no parent"))
            })
    }

    async fn list_tags(&self, account_id: &str) -> AwsResult<Tags> {
        let mut tags = Tags::new();
        let mut next_token: Option<String> = None;

        loop {
            let out = self
                .client
                .list_tags_for_resource()
                .resource_id(account_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| organizations_error("list-tags-for-resource", account_id, e))?;

            for tag in out.tags() {
                tags.insert(tag.key().to_string(), tag.value().to_string());
            }

            next_token = out.next_token().map(ToString::to_string);
            if next_token.is_none() {
                break;
            }
        }

        Ok(tags)
    }

    async fn tag_account(&self, account_id: &str, tags: &Tags) -> AwsResult<()> {
        let sdk_tags = tags
            .iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                AwsError::OrganizationsError(format!("Invalid tag for account {account_id}: {e}"))
            })?;

        self.client
            .tag_resource()
            .resource_id(account_id)
            .set_tags(Some(sdk_tags))
            .send()
            .await
            .map_err(|e| organizations_error("tag-resource", account_id, e))?;
        Ok(())
    }

    async fn untag_account(&self, account_id: &str, keys: &[String]) -> AwsResult<()> {
        self.client
            .untag_resource()
            .resource_id(account_id)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(|e| organizations_error("untag-resource", account_id, e))?;
        Ok(())
    }

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> AwsResult<()> {
        self.client
            .move_account()
            .account_id(account_id)
            .source_parent_id(source_parent_id)
            .destination_parent_id(destination_parent_id)
            .send()
            .await
            .map_err(|e| organizations_error("move-account", account_id, e))?;
        Ok(())
    }
}
