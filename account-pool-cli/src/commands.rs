//! Subcommand handlers.
//!
//! Configuration and input are validated before the AWS clients are built, so
//! usage errors never reach the network.

use std::path::Path;

use account_pool_core::account::validate_account_id;
use account_pool_core::{
    Allocator, CloudGateway, Confirm, OwnershipIndex, PayerConfig, PoolConfig, PoolError,
    ReclaimOutcome, ReclaimTarget, Reclaimer,
};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::Serialize;

use crate::output;

/// Load the pool configuration and resolve the payer by name
pub(crate) fn resolve_payer(config_path: Option<&Path>, payer_name: &str) -> Result<(PoolConfig, PayerConfig)> {
    let config = PoolConfig::load(config_path).context("Failed to load pool configuration")?;
    let payer = config
        .payer(payer_name)
        .with_context(|| format!("Cannot use payer '{payer_name}'"))?
        .clone();
    debug!(
        "Payer {payer_name}: root {}, claimed OU {}",
        payer.root_ou_id, payer.claimed_ou_id
    );
    Ok((config, payer))
}

async fn connect(payer: &PayerConfig) -> Result<CloudGateway> {
    CloudGateway::connect(payer)
        .await
        .context("Failed to set up AWS clients for the payer account")
}

pub(crate) async fn assign(
    config: &PoolConfig,
    payer: &PayerConfig,
    username: &str,
    account_id: Option<&str>,
) -> Result<()> {
    if username.trim().is_empty() {
        bail!("--username must not be empty");
    }
    if let Some(id) = account_id {
        validate_account_id(id)?;
    }

    let gateway = connect(payer).await?;
    let allocator = Allocator::new(gateway.organizations.as_ref(), payer, &config.allocation);

    let assigned = match account_id {
        Some(id) => allocator
            .claim_account(id, username)
            .await
            .with_context(|| format!("Failed to assign account {id} to {username}"))?,
        None => allocator
            .run(username)
            .await
            .with_context(|| format!("Failed to assign an account to {username}"))?,
    };

    output::print_assigned(&assigned, username, &payer.claimed_ou_id);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccountOwner<'a> {
    account_id: &'a str,
    owner: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UserAccounts<'a> {
    user: &'a str,
    accounts: &'a [String],
}

pub(crate) async fn list(
    payer: &PayerConfig,
    user: Option<&str>,
    account_id: Option<&str>,
    pretty: bool,
) -> Result<()> {
    if let Some(id) = account_id {
        validate_account_id(id)?;
    }

    let gateway = connect(payer).await?;
    let index = OwnershipIndex::new(gateway.organizations.as_ref(), gateway.tagging.as_ref());

    match (account_id, user) {
        (Some(id), _) => {
            let owner = index
                .list_user_name(id)
                .await
                .with_context(|| format!("Failed to look up the owner of account {id}"))?;
            output::output_json(&AccountOwner { account_id: id, owner: &owner }, pretty)
        }
        (None, Some(user)) => {
            let accounts = index
                .list_accounts_by_user(user)
                .await
                .with_context(|| format!("Failed to list the accounts of {user}"))?;
            output::output_json(&UserAccounts { user, accounts: &accounts }, pretty)
        }
        (None, None) => {
            let owners = index
                .list_all_accounts(&payer.claimed_ou_id)
                .await
                .with_context(|| format!("Failed to list the accounts under {}", payer.claimed_ou_id))?;
            output::output_json(&owners, pretty)
        }
    }
}

/// Confirmation read from the terminal
struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        output::prompt_confirm(prompt)
    }
}

/// Confirmation given up front with `--yes`
struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> bool {
        info!("Confirmed by --yes: {prompt}");
        true
    }
}

pub(crate) async fn unassign(
    config: &PoolConfig,
    payer: &PayerConfig,
    target: ReclaimTarget,
    yes: bool,
) -> Result<()> {
    if let ReclaimTarget::Account(id) = &target {
        validate_account_id(id)?;
    }
    if !yes && !atty::is(atty::Stream::Stdin) {
        bail!("Refusing to reclaim without confirmation in a non-interactive environment; pass --yes");
    }
    let confirm: &dyn Confirm = if yes { &AssumeYes } else { &TerminalConfirm };

    let gateway = connect(payer).await?;
    let reclaimer = Reclaimer::new(
        gateway.organizations.as_ref(),
        gateway.tagging.as_ref(),
        gateway.sts.as_ref(),
        payer,
        &config.reclaim,
    );

    match reclaimer.run(&target, confirm).await {
        Ok(ReclaimOutcome::Declined) => {
            output::note("aborted; nothing was changed");
            Ok(())
        }
        Ok(ReclaimOutcome::Completed(reports)) => {
            output::print_reports(&reports);
            output::note(&format!("reclaimed {} account(s)", reports.len()));
            Ok(())
        }
        Err(PoolError::TeardownIncomplete { failed, reports }) => {
            output::print_reports(&reports);
            output::warn("accounts were returned to the pool root; remove the failed artifacts by hand or re-run");
            bail!("Teardown incomplete: {failed} artifact(s) could not be removed")
        }
        Err(e) => {
            if let PoolError::ReclaimAborted { reports, .. } = &e {
                if !reports.is_empty() {
                    output::print_reports(reports);
                    output::warn("the accounts above were reclaimed before the run stopped");
                }
            }
            Err(e).with_context(|| format!("Failed to reclaim {target}"))
        }
    }
}
