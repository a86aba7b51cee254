//! In-memory implementations of the gateway traits.
//!
//! They keep a call log and enforce the same dependency rules IAM does (a user with
//! keys cannot be deleted, a policy with versions cannot be deleted, ...), so tests can
//! assert both the end state and the order of calls. Any call can be made to fail by
//! registering its log entry with `fail_on`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::account::{Account, AccountStatus, Tags, CLAIMED_TAG, CLAIM_TOKEN_TAG, OWNER_TAG};
use crate::aws::{
    AttachedPolicy, AwsError, AwsResult, IamApi, OrganizationsApi, PolicyEntities, PolicySummary,
    PolicyVersionSummary, RoleSummary, StsApi, TaggingApi,
};

/// Organization ID used in generated account ARNs
const FAKE_ORG: &str = "o-fake0000";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(calls: &mut Vec<String>, failures: &BTreeSet<String>, entry: String) -> Result<(), String> {
    let failed = failures.contains(&entry);
    calls.push(entry.clone());
    if failed {
        Err(format!("{entry}: injected failure"))
    } else {
        Ok(())
    }
}

struct FakeAccount {
    account: Account,
    parent: String,
    tags: Tags,
}

#[derive(Default)]
struct OrgState {
    accounts: Vec<FakeAccount>,
    /// Tagged resources that are not accounts
    other_resources: Vec<(String, Tags)>,
    /// Account -> rival owner that overwrites the next claim written to it
    rivals: BTreeMap<String, String>,
    calls: Vec<String>,
    failures: BTreeSet<String>,
}

impl OrgState {
    fn find(&mut self, account_id: &str) -> AwsResult<&mut FakeAccount> {
        self.accounts
            .iter_mut()
            .find(|a| a.account.id == account_id)
            .ok_or_else(|| {
                AwsError::OrganizationsError(format!(
                    "AccountNotFoundException: account {account_id} does not exist"
                ))
            })
    }

    fn check(&mut self, entry: String) -> AwsResult<()> {
        record(&mut self.calls, &self.failures, entry).map_err(AwsError::OrganizationsError)
    }
}

/// Organizations and resource-tagging backend in one: the reverse tag search sees
/// exactly the tags written through `OrganizationsApi`.
#[derive(Default)]
pub struct InMemoryOrganizations {
    state: Mutex<OrgState>,
}

impl InMemoryOrganizations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account under `parent` with the given tags
    pub fn add_account(&self, parent: &str, account_id: &str, status: AccountStatus, tags: &[(&str, &str)]) {
        lock(&self.state).accounts.push(FakeAccount {
            account: Account::new(account_id, status),
            parent: parent.to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        });
    }

    /// Add a resource returned by the reverse tag search. Given an account ARN it
    /// stands for an index entry that has not caught up with the account's tags.
    pub fn add_tagged_resource(&self, arn: &str, tags: &[(&str, &str)]) {
        lock(&self.state).other_resources.push((
            arn.to_string(),
            tags.iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
    }

    /// Simulate a concurrent allocator: right after the next tag write to
    /// `account_id`, `owner` claims it with its own token.
    pub fn add_rival_claim(&self, account_id: &str, owner: &str) {
        lock(&self.state)
            .rivals
            .insert(account_id.to_string(), owner.to_string());
    }

    /// Make the call with this log entry fail, e.g. `MoveAccount:111111111111`
    pub fn fail_on(&self, entry: &str) {
        lock(&self.state).failures.insert(entry.to_string());
    }

    #[must_use]
    pub fn tags(&self, account_id: &str) -> Tags {
        lock(&self.state)
            .accounts
            .iter()
            .find(|a| a.account.id == account_id)
            .map(|a| a.tags.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parent(&self, account_id: &str) -> Option<String> {
        lock(&self.state)
            .accounts
            .iter()
            .find(|a| a.account.id == account_id)
            .map(|a| a.parent.clone())
    }

    /// Every call made so far, as `Operation:target`
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    /// Calls that changed state
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.starts_with("TagResource")
                    || c.starts_with("UntagResource")
                    || c.starts_with("MoveAccount")
            })
            .collect()
    }

    #[must_use]
    pub fn account_arn(account_id: &str) -> String {
        format!("arn:aws:organizations::000000000000:account/{FAKE_ORG}/{account_id}")
    }
}

#[async_trait]
impl OrganizationsApi for InMemoryOrganizations {
    async fn list_accounts_for_parent(&self, parent_id: &str) -> AwsResult<Vec<Account>> {
        let mut state = lock(&self.state);
        state.check(format!("ListAccountsForParent:{parent_id}"))?;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.parent == parent_id)
            .map(|a| a.account.clone())
            .collect())
    }

    async fn parent_of(&self, account_id: &str) -> AwsResult<String> {
        let mut state = lock(&self.state);
        state.check(format!("ListParents:{account_id}"))?;
        Ok(state.find(account_id)?.parent.clone())
    }

    async fn list_tags(&self, account_id: &str) -> AwsResult<Tags> {
        let mut state = lock(&self.state);
        state.check(format!("ListTagsForResource:{account_id}"))?;
        Ok(state.find(account_id)?.tags.clone())
    }

    async fn tag_account(&self, account_id: &str, tags: &Tags) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("TagResource:{account_id}"))?;
        let rival = state.rivals.remove(account_id);
        let account = state.find(account_id)?;
        account
            .tags
            .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(owner) = rival {
            account.tags.insert(OWNER_TAG.to_string(), owner.clone());
            account.tags.insert(CLAIMED_TAG.to_string(), "true".to_string());
            account
                .tags
                .insert(CLAIM_TOKEN_TAG.to_string(), format!("rival-{owner}"));
        }
        Ok(())
    }

    async fn untag_account(&self, account_id: &str, keys: &[String]) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("UntagResource:{account_id}"))?;
        let account = state.find(account_id)?;
        for key in keys {
            account.tags.remove(key);
        }
        Ok(())
    }

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("MoveAccount:{account_id}"))?;
        let account = state.find(account_id)?;
        if account.parent != source_parent_id {
            return Err(AwsError::OrganizationsError(format!(
                "SourceParentNotFoundException: account {account_id} is not under {source_parent_id}"
            )));
        }
        account.parent = destination_parent_id.to_string();
        Ok(())
    }
}

#[async_trait]
impl TaggingApi for InMemoryOrganizations {
    async fn find_resource_arns(&self, key: &str, value: &str) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state
            .check(format!("GetResources:{key}={value}"))
            .map_err(|e| AwsError::TaggingError(e.to_string()))?;
        let matches = |tags: &Tags| tags.get(key).is_some_and(|v| v == value);

        let mut arns: Vec<String> = state
            .accounts
            .iter()
            .filter(|a| matches(&a.tags))
            .map(|a| Self::account_arn(&a.account.id))
            .collect();
        arns.extend(
            state
                .other_resources
                .iter()
                .filter(|(_, tags)| matches(tags))
                .map(|(arn, _)| arn.clone()),
        );
        Ok(arns)
    }
}

#[derive(Default)]
struct FakeRole {
    path: String,
    attached: BTreeSet<String>,
    inline: BTreeSet<String>,
}

struct FakePolicy {
    name: String,
    /// (version id, is default)
    versions: Vec<(String, bool)>,
}

#[derive(Default)]
struct FakeUser {
    login_profile: bool,
    access_keys: BTreeSet<String>,
    certificates: BTreeSet<String>,
    inline: BTreeSet<String>,
    attached: BTreeSet<String>,
    groups: BTreeSet<String>,
}

impl FakeUser {
    fn dependents(&self) -> usize {
        usize::from(self.login_profile)
            + self.access_keys.len()
            + self.certificates.len()
            + self.inline.len()
            + self.attached.len()
            + self.groups.len()
    }
}

#[derive(Default)]
struct IamState {
    roles: BTreeMap<String, FakeRole>,
    policies: BTreeMap<String, FakePolicy>,
    users: BTreeMap<String, FakeUser>,
    /// group -> attached policy ARNs
    groups: BTreeMap<String, BTreeSet<String>>,
    calls: Vec<String>,
    failures: BTreeSet<String>,
}

fn no_such_entity(what: &str) -> AwsError {
    AwsError::IamError(format!("NoSuchEntity: {what} does not exist"))
}

fn delete_conflict(what: &str) -> AwsError {
    AwsError::IamError(format!("DeleteConflict: {what} still has dependent entities"))
}

impl IamState {
    fn check(&mut self, entry: String) -> AwsResult<()> {
        record(&mut self.calls, &self.failures, entry).map_err(AwsError::IamError)
    }

    fn role(&mut self, name: &str) -> AwsResult<&mut FakeRole> {
        self.roles
            .get_mut(name)
            .ok_or_else(|| no_such_entity(&format!("role {name}")))
    }

    fn user(&mut self, name: &str) -> AwsResult<&mut FakeUser> {
        self.users
            .get_mut(name)
            .ok_or_else(|| no_such_entity(&format!("user {name}")))
    }

    fn entities(&self, policy_arn: &str) -> PolicyEntities {
        PolicyEntities {
            users: self
                .users
                .iter()
                .filter(|(_, u)| u.attached.contains(policy_arn))
                .map(|(n, _)| n.clone())
                .collect(),
            groups: self
                .groups
                .iter()
                .filter(|(_, attached)| attached.contains(policy_arn))
                .map(|(n, _)| n.clone())
                .collect(),
            roles: self
                .roles
                .iter()
                .filter(|(_, r)| r.attached.contains(policy_arn))
                .map(|(n, _)| n.clone())
                .collect(),
        }
    }
}

fn take(set: &mut BTreeSet<String>, item: &str, what: &str) -> AwsResult<()> {
    if set.remove(item) {
        Ok(())
    } else {
        Err(no_such_entity(&format!("{what} {item}")))
    }
}

/// IAM contents of one account. Clones share state, so a test can keep a handle
/// while the reclaimer works on the session returned by `InMemorySts`.
#[derive(Clone, Default)]
pub struct InMemoryIam {
    account_id: String,
    state: Arc<Mutex<IamState>>,
}

impl InMemoryIam {
    #[must_use]
    pub fn new(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            state: Arc::default(),
        }
    }

    pub fn add_role(&self, name: &str, path: &str) {
        lock(&self.state).roles.insert(
            name.to_string(),
            FakeRole {
                path: path.to_string(),
                ..FakeRole::default()
            },
        );
    }

    pub fn attach_role_policy(&self, role: &str, policy_arn: &str) {
        if let Some(r) = lock(&self.state).roles.get_mut(role) {
            r.attached.insert(policy_arn.to_string());
        }
    }

    pub fn put_role_policy(&self, role: &str, policy_name: &str) {
        if let Some(r) = lock(&self.state).roles.get_mut(role) {
            r.inline.insert(policy_name.to_string());
        }
    }

    /// Create a customer managed policy with `extra_versions` non-default versions; returns its ARN
    pub fn add_policy(&self, name: &str, extra_versions: usize) -> String {
        let arn = format!("arn:aws:iam::{}:policy/{name}", self.account_id);
        let mut versions = vec![("v1".to_string(), true)];
        versions.extend((0..extra_versions).map(|i| (format!("v{}", i + 2), false)));
        lock(&self.state).policies.insert(
            arn.clone(),
            FakePolicy {
                name: name.to_string(),
                versions,
            },
        );
        arn
    }

    pub fn add_user(&self, name: &str) {
        lock(&self.state)
            .users
            .insert(name.to_string(), FakeUser::default());
    }

    fn with_user(&self, name: &str, f: impl FnOnce(&mut FakeUser)) {
        if let Some(user) = lock(&self.state).users.get_mut(name) {
            f(user);
        }
    }

    pub fn set_login_profile(&self, user: &str) {
        self.with_user(user, |u| u.login_profile = true);
    }

    pub fn add_access_key(&self, user: &str, key_id: &str) {
        self.with_user(user, |u| {
            u.access_keys.insert(key_id.to_string());
        });
    }

    pub fn add_signing_certificate(&self, user: &str, certificate_id: &str) {
        self.with_user(user, |u| {
            u.certificates.insert(certificate_id.to_string());
        });
    }

    pub fn put_user_policy(&self, user: &str, policy_name: &str) {
        self.with_user(user, |u| {
            u.inline.insert(policy_name.to_string());
        });
    }

    pub fn attach_user_policy(&self, user: &str, policy_arn: &str) {
        self.with_user(user, |u| {
            u.attached.insert(policy_arn.to_string());
        });
    }

    pub fn add_user_to_group(&self, user: &str, group: &str) {
        let mut state = lock(&self.state);
        state.groups.entry(group.to_string()).or_default();
        if let Some(u) = state.users.get_mut(user) {
            u.groups.insert(group.to_string());
        }
    }

    pub fn attach_group_policy(&self, group: &str, policy_arn: &str) {
        lock(&self.state)
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(policy_arn.to_string());
    }

    /// Make the call with this log entry fail, e.g. `DeleteAccessKey:alice/AKIA1`
    pub fn fail_on(&self, entry: &str) {
        lock(&self.state).failures.insert(entry.to_string());
    }

    #[must_use]
    pub fn role_names(&self) -> Vec<String> {
        lock(&self.state).roles.keys().cloned().collect()
    }

    #[must_use]
    pub fn user_names(&self) -> Vec<String> {
        lock(&self.state).users.keys().cloned().collect()
    }

    #[must_use]
    pub fn policy_arns(&self) -> Vec<String> {
        lock(&self.state).policies.keys().cloned().collect()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }
}

#[async_trait]
impl IamApi for InMemoryIam {
    async fn list_roles(&self) -> AwsResult<Vec<RoleSummary>> {
        let mut state = lock(&self.state);
        state.check("ListRoles:".to_string())?;
        Ok(state
            .roles
            .iter()
            .map(|(name, role)| RoleSummary {
                name: name.clone(),
                path: role.path.clone(),
            })
            .collect())
    }

    async fn list_attached_role_policies(&self, role_name: &str) -> AwsResult<Vec<AttachedPolicy>> {
        let mut state = lock(&self.state);
        state.check(format!("ListAttachedRolePolicies:{role_name}"))?;
        Ok(attached_policies(&state.role(role_name)?.attached))
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DetachRolePolicy:{role_name}/{policy_arn}"))?;
        take(&mut state.role(role_name)?.attached, policy_arn, "attachment")
    }

    async fn list_role_policies(&self, role_name: &str) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.check(format!("ListRolePolicies:{role_name}"))?;
        Ok(state.role(role_name)?.inline.iter().cloned().collect())
    }

    async fn delete_role_policy(&self, role_name: &str, policy_name: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteRolePolicy:{role_name}/{policy_name}"))?;
        take(&mut state.role(role_name)?.inline, policy_name, "inline policy")
    }

    async fn delete_role(&self, role_name: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteRole:{role_name}"))?;
        let role = state.role(role_name)?;
        if !role.attached.is_empty() || !role.inline.is_empty() {
            return Err(delete_conflict(&format!("role {role_name}")));
        }
        state.roles.remove(role_name);
        Ok(())
    }

    async fn list_local_policies(&self) -> AwsResult<Vec<PolicySummary>> {
        let mut state = lock(&self.state);
        state.check("ListPolicies:Local".to_string())?;
        Ok(state
            .policies
            .iter()
            .map(|(arn, policy)| PolicySummary {
                name: policy.name.clone(),
                arn: arn.clone(),
            })
            .collect())
    }

    async fn list_policy_entities(&self, policy_arn: &str) -> AwsResult<PolicyEntities> {
        let mut state = lock(&self.state);
        state.check(format!("ListEntitiesForPolicy:{policy_arn}"))?;
        Ok(state.entities(policy_arn))
    }

    async fn detach_group_policy(&self, group_name: &str, policy_arn: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DetachGroupPolicy:{group_name}/{policy_arn}"))?;
        let group = state
            .groups
            .get_mut(group_name)
            .ok_or_else(|| no_such_entity(&format!("group {group_name}")))?;
        take(group, policy_arn, "attachment")
    }

    async fn list_policy_versions(&self, policy_arn: &str) -> AwsResult<Vec<PolicyVersionSummary>> {
        let mut state = lock(&self.state);
        state.check(format!("ListPolicyVersions:{policy_arn}"))?;
        let policy = state
            .policies
            .get(policy_arn)
            .ok_or_else(|| no_such_entity(&format!("policy {policy_arn}")))?;
        Ok(policy
            .versions
            .iter()
            .map(|(id, is_default)| PolicyVersionSummary {
                version_id: id.clone(),
                is_default: *is_default,
            })
            .collect())
    }

    async fn delete_policy_version(&self, policy_arn: &str, version_id: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeletePolicyVersion:{policy_arn}/{version_id}"))?;
        let policy = state
            .policies
            .get_mut(policy_arn)
            .ok_or_else(|| no_such_entity(&format!("policy {policy_arn}")))?;
        match policy.versions.iter().position(|(id, _)| id == version_id) {
            Some(index) if policy.versions[index].1 => Err(delete_conflict(&format!(
                "default version {version_id} of {policy_arn}"
            ))),
            Some(index) => {
                policy.versions.remove(index);
                Ok(())
            }
            None => Err(no_such_entity(&format!("version {version_id}"))),
        }
    }

    async fn delete_policy(&self, policy_arn: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeletePolicy:{policy_arn}"))?;
        let entities = state.entities(policy_arn);
        let policy = state
            .policies
            .get(policy_arn)
            .ok_or_else(|| no_such_entity(&format!("policy {policy_arn}")))?;
        if policy.versions.len() > 1
            || !entities.users.is_empty()
            || !entities.groups.is_empty()
            || !entities.roles.is_empty()
        {
            return Err(delete_conflict(&format!("policy {policy_arn}")));
        }
        state.policies.remove(policy_arn);
        Ok(())
    }

    async fn list_users(&self) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.check("ListUsers:".to_string())?;
        Ok(state.users.keys().cloned().collect())
    }

    async fn delete_login_profile(&self, user_name: &str) -> AwsResult<bool> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteLoginProfile:{user_name}"))?;
        let user = state.user(user_name)?;
        Ok(std::mem::take(&mut user.login_profile))
    }

    async fn list_access_keys(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.check(format!("ListAccessKeys:{user_name}"))?;
        Ok(state.user(user_name)?.access_keys.iter().cloned().collect())
    }

    async fn delete_access_key(&self, user_name: &str, access_key_id: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteAccessKey:{user_name}/{access_key_id}"))?;
        take(&mut state.user(user_name)?.access_keys, access_key_id, "access key")
    }

    async fn list_signing_certificates(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.check(format!("ListSigningCertificates:{user_name}"))?;
        Ok(state.user(user_name)?.certificates.iter().cloned().collect())
    }

    async fn delete_signing_certificate(&self, user_name: &str, certificate_id: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteSigningCertificate:{user_name}/{certificate_id}"))?;
        take(&mut state.user(user_name)?.certificates, certificate_id, "certificate")
    }

    async fn list_user_policies(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.check(format!("ListUserPolicies:{user_name}"))?;
        Ok(state.user(user_name)?.inline.iter().cloned().collect())
    }

    async fn delete_user_policy(&self, user_name: &str, policy_name: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteUserPolicy:{user_name}/{policy_name}"))?;
        take(&mut state.user(user_name)?.inline, policy_name, "inline policy")
    }

    async fn list_attached_user_policies(&self, user_name: &str) -> AwsResult<Vec<AttachedPolicy>> {
        let mut state = lock(&self.state);
        state.check(format!("ListAttachedUserPolicies:{user_name}"))?;
        Ok(attached_policies(&state.user(user_name)?.attached))
    }

    async fn detach_user_policy(&self, user_name: &str, policy_arn: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DetachUserPolicy:{user_name}/{policy_arn}"))?;
        take(&mut state.user(user_name)?.attached, policy_arn, "attachment")
    }

    async fn list_groups_for_user(&self, user_name: &str) -> AwsResult<Vec<String>> {
        let mut state = lock(&self.state);
        state.check(format!("ListGroupsForUser:{user_name}"))?;
        Ok(state.user(user_name)?.groups.iter().cloned().collect())
    }

    async fn remove_user_from_group(&self, user_name: &str, group_name: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("RemoveUserFromGroup:{user_name}/{group_name}"))?;
        take(&mut state.user(user_name)?.groups, group_name, "group membership")
    }

    async fn delete_user(&self, user_name: &str) -> AwsResult<()> {
        let mut state = lock(&self.state);
        state.check(format!("DeleteUser:{user_name}"))?;
        if state.user(user_name)?.dependents() > 0 {
            return Err(delete_conflict(&format!("user {user_name}")));
        }
        state.users.remove(user_name);
        Ok(())
    }
}

fn attached_policies(arns: &BTreeSet<String>) -> Vec<AttachedPolicy> {
    arns.iter()
        .map(|arn| AttachedPolicy {
            name: arn.rsplit('/').next().unwrap_or(arn).to_string(),
            arn: arn.clone(),
        })
        .collect()
}

#[derive(Default)]
struct StsState {
    sessions: BTreeMap<String, InMemoryIam>,
    calls: Vec<String>,
    failures: BTreeSet<String>,
}

/// STS backend handing out `InMemoryIam` sessions per target account
pub struct InMemorySts {
    caller_account_id: String,
    state: Mutex<StsState>,
}

impl InMemorySts {
    #[must_use]
    pub fn new(caller_account_id: &str) -> Self {
        Self {
            caller_account_id: caller_account_id.to_string(),
            state: Mutex::default(),
        }
    }

    /// IAM contents of `account_id`, created empty on first use
    #[must_use]
    pub fn iam_for(&self, account_id: &str) -> InMemoryIam {
        lock(&self.state)
            .sessions
            .entry(account_id.to_string())
            .or_insert_with(|| InMemoryIam::new(account_id))
            .clone()
    }

    /// Make the call with this log entry fail, e.g. `AssumeRole:111111111111`
    pub fn fail_on(&self, entry: &str) {
        lock(&self.state).failures.insert(entry.to_string());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }
}

#[async_trait]
impl StsApi for InMemorySts {
    async fn caller_account_id(&self) -> AwsResult<String> {
        Ok(self.caller_account_id.clone())
    }

    async fn assume_role_for_iam(
        &self,
        role_arn: &str,
        session_name: &str,
        _duration_seconds: i32,
    ) -> AwsResult<Box<dyn IamApi>> {
        let account_id = role_arn
            .split(':')
            .nth(4)
            .ok_or_else(|| AwsError::SdkError(format!("malformed role ARN {role_arn}")))?
            .to_string();
        {
            let mut state = lock(&self.state);
            let StsState {
                calls, failures, ..
            } = &mut *state;
            record(calls, failures, format!("AssumeRole:{account_id}"))
                .map_err(AwsError::SdkError)?;
            calls.push(format!("Session:{session_name}"));
        }
        Ok(Box::new(self.iam_for(&account_id)))
    }
}
