//! In-memory directory used by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use org_policy::change::Change;
use org_policy::protection::{
    BranchProtection, DismissalRestrictions, EnabledSetting, LoginRef, ProtectionSettings,
    PullRequestReviews, SlugRef, StatusChecks,
};
use org_policy::{
    Directory, DirectoryError, Member, Permission, Permissions, Repository, Scope, TeamRef,
};

#[derive(Debug, Clone)]
pub enum ProtectionFixture {
    Unprotected,
    Protected(BranchProtection),
    /// Reading protection fails with this status.
    Unreadable(u16),
}

#[derive(Debug, Default)]
struct TeamState {
    members: BTreeSet<String>,
    repos: BTreeSet<String>,
    grants: BTreeMap<String, Permissions>,
}

#[derive(Debug, Default)]
struct State {
    org_members: BTreeMap<String, BTreeSet<String>>,
    repos: BTreeMap<String, Repository>,
    teams: BTreeMap<TeamKey, TeamState>,
    settings: BTreeMap<String, Map<String, Value>>,
    branches: BTreeMap<String, BTreeMap<String, ProtectionFixture>>,
    broken_branches: BTreeMap<String, u16>,
    renamed_branches: BTreeMap<(String, String), String>,
    failing_repos: BTreeSet<String>,
    fetches: BTreeMap<String, usize>,
    mutations: Vec<String>,
}

type TeamKey = (String, String);

fn key(team: &TeamRef) -> TeamKey {
    (team.org.clone(), team.slug.clone())
}

fn not_found(what: &str) -> DirectoryError {
    DirectoryError::Api {
        status: 404,
        message: format!("{what} Not Found"),
    }
}

pub fn team(org: &str, slug: &str) -> TeamRef {
    TeamRef::new(org, slug)
}

#[derive(Debug, Default)]
pub struct FakeDirectory {
    state: Mutex<State>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap()
    }

    pub fn member(mut self, org: &str, login: &str) -> Self {
        self.state_mut()
            .org_members
            .entry(org.to_string())
            .or_default()
            .insert(login.to_string());
        self
    }

    pub fn repo(mut self, full_name: &str, archived: bool) -> Self {
        self.state_mut()
            .repos
            .insert(full_name.to_string(), Repository::new(full_name, archived));
        self
    }

    pub fn setting(mut self, repo: &str, name: &str, value: Value) -> Self {
        self.state_mut()
            .settings
            .entry(repo.to_string())
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn team(mut self, org: &str, slug: &str) -> Self {
        self.state_mut()
            .teams
            .entry((org.to_string(), slug.to_string()))
            .or_default();
        self
    }

    pub fn team_member(mut self, org: &str, slug: &str, login: &str) -> Self {
        self.state_mut()
            .teams
            .entry((org.to_string(), slug.to_string()))
            .or_default()
            .members
            .insert(login.to_string());
        self
    }

    /// Registers `repo` with the team holding exactly `flags`.
    pub fn grant(mut self, org: &str, slug: &str, repo: &str, flags: Permissions) -> Self {
        let team = self
            .state_mut()
            .teams
            .entry((org.to_string(), slug.to_string()))
            .or_default();
        team.repos.insert(repo.to_string());
        team.grants.insert(repo.to_string(), flags);
        self
    }

    pub fn branch(mut self, repo: &str, branch: &str, protection: ProtectionFixture) -> Self {
        self.state_mut()
            .branches
            .entry(repo.to_string())
            .or_default()
            .insert(branch.to_string(), protection);
        self
    }

    /// Looking up `old` in `repo` answers with `new`, the way GitHub follows
    /// a renamed branch.
    pub fn renamed_branch(mut self, repo: &str, old: &str, new: &str) -> Self {
        self.state_mut()
            .renamed_branches
            .insert((repo.to_string(), old.to_string()), new.to_string());
        self
    }

    /// Looking up any branch of `repo` fails with `status`.
    pub fn broken_branches(mut self, repo: &str, status: u16) -> Self {
        self.state_mut()
            .broken_branches
            .insert(repo.to_string(), status);
        self
    }

    /// Every edit touching `repo` fails.
    pub fn failing(mut self, repo: &str) -> Self {
        self.state_mut().failing_repos.insert(repo.to_string());
        self
    }

    pub fn fetches(&self, what: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.fetches.get(what).copied().unwrap_or(0)
    }

    /// Descriptions of every mutation applied so far, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn protection(&self, repo: &str, branch: &str) -> Option<ProtectionFixture> {
        let state = self.state.lock().unwrap();
        state.branches.get(repo)?.get(branch).cloned()
    }

    pub fn team_members(&self, org: &str, slug: &str) -> BTreeSet<String> {
        let state = self.state.lock().unwrap();
        state
            .teams
            .get(&(org.to_string(), slug.to_string()))
            .map(|team| team.members.clone())
            .unwrap_or_default()
    }

    pub async fn apply_all(&self, changes: &[Change]) {
        for change in changes {
            change.apply(self).await.unwrap();
        }
    }

    fn mutate(&self, repo: &str, description: String) -> Result<(), DirectoryError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_repos.contains(repo) {
            return Err(DirectoryError::Api {
                status: 422,
                message: format!("Validation Failed for {repo}"),
            });
        }
        state.mutations.push(description);
        Ok(())
    }
}

/// Nests flat settings back into the read shape, the way GitHub would report
/// them after an edit.
pub fn nest(settings: &ProtectionSettings) -> BranchProtection {
    let reviews = if settings.dismissal_users.is_some()
        || settings.dismissal_teams.is_some()
        || settings.dismiss_stale_reviews.is_some()
        || settings.require_code_owner_reviews.is_some()
        || settings.required_approving_review_count.is_some()
    {
        let dismissal_restrictions =
            if settings.dismissal_users.is_some() || settings.dismissal_teams.is_some() {
                Some(DismissalRestrictions {
                    users: settings
                        .dismissal_users
                        .iter()
                        .flatten()
                        .map(|login| LoginRef {
                            login: login.clone(),
                        })
                        .collect(),
                    teams: settings
                        .dismissal_teams
                        .iter()
                        .flatten()
                        .map(|slug| SlugRef { slug: slug.clone() })
                        .collect(),
                })
            } else {
                None
            };
        Some(PullRequestReviews {
            dismissal_restrictions,
            dismiss_stale_reviews: settings.dismiss_stale_reviews.unwrap_or(false),
            require_code_owner_reviews: settings.require_code_owner_reviews.unwrap_or(false),
            required_approving_review_count: settings.required_approving_review_count,
        })
    } else {
        None
    };

    let status_checks = if settings.strict.is_some() || settings.contexts.is_some() {
        Some(StatusChecks {
            strict: settings.strict.unwrap_or(false),
            contexts: settings.contexts.clone().unwrap_or_default(),
        })
    } else {
        None
    };

    BranchProtection {
        enforce_admins: Some(EnabledSetting {
            enabled: settings.enforce_admins.unwrap_or(false),
        }),
        required_pull_request_reviews: reviews,
        required_status_checks: status_checks,
        ..Default::default()
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn members(&self, scope: &Scope) -> Result<Vec<Member>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(format!("members:{scope}")).or_default() += 1;
        let logins = match scope {
            Scope::Organization(org) => state.org_members.get(org).cloned().unwrap_or_default(),
            Scope::Team(team) => state
                .teams
                .get(&key(team))
                .ok_or_else(|| not_found("Team"))?
                .members
                .clone(),
        };
        Ok(logins.into_iter().map(Member::new).collect())
    }

    async fn repos(&self, scope: &Scope) -> Result<Vec<Repository>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(format!("repos:{scope}")).or_default() += 1;
        match scope {
            Scope::Organization(org) => Ok(state
                .repos
                .values()
                .filter(|repo| repo.owner() == org)
                .cloned()
                .collect()),
            Scope::Team(team) => {
                let names = state
                    .teams
                    .get(&key(team))
                    .ok_or_else(|| not_found("Team"))?
                    .repos
                    .clone();
                Ok(names
                    .iter()
                    .filter_map(|name| state.repos.get(name).cloned())
                    .collect())
            }
        }
    }

    async fn add_member(&self, team: &TeamRef, login: &str) -> Result<(), DirectoryError> {
        self.mutate("", format!("add_member {team} {login}"))?;
        let mut state = self.state.lock().unwrap();
        state
            .teams
            .get_mut(&key(team))
            .ok_or_else(|| not_found("Team"))?
            .members
            .insert(login.to_string());
        Ok(())
    }

    async fn add_repo(&self, team: &TeamRef, repo: &str) -> Result<(), DirectoryError> {
        self.mutate(repo, format!("add_repo {team} {repo}"))?;
        let mut state = self.state.lock().unwrap();
        let team = state
            .teams
            .get_mut(&key(team))
            .ok_or_else(|| not_found("Team"))?;
        team.repos.insert(repo.to_string());
        // GitHub registers new repositories with pull access.
        team.grants
            .entry(repo.to_string())
            .or_insert_with(|| Permission::Pull.flags());
        Ok(())
    }

    async fn set_permission(
        &self,
        team: &TeamRef,
        repo: &str,
        permission: Permission,
    ) -> Result<(), DirectoryError> {
        self.mutate(repo, format!("set_permission {team} {repo} {permission}"))?;
        let mut state = self.state.lock().unwrap();
        let team = state
            .teams
            .get_mut(&key(team))
            .ok_or_else(|| not_found("Team"))?;
        team.repos.insert(repo.to_string());
        team.grants.insert(repo.to_string(), permission.flags());
        Ok(())
    }

    async fn permission(
        &self,
        team: &TeamRef,
        repo: &str,
    ) -> Result<Option<Permissions>, DirectoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .teams
            .get(&key(team))
            .and_then(|team| team.grants.get(repo).cloned()))
    }

    async fn repo_settings(&self, repo: &str) -> Result<Map<String, Value>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        *state.fetches.entry(format!("settings:{repo}")).or_default() += 1;
        Ok(state.settings.get(repo).cloned().unwrap_or_default())
    }

    async fn edit_repo(
        &self,
        repo: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), DirectoryError> {
        let fields: Vec<&String> = settings.keys().collect();
        self.mutate(repo, format!("edit_repo {repo} {fields:?}"))?;
        let mut state = self.state.lock().unwrap();
        let current = state.settings.entry(repo.to_string()).or_default();
        for (name, value) in settings {
            current.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn branch(&self, repo: &str, branch: &str) -> Result<Option<String>, DirectoryError> {
        let mut state = self.state.lock().unwrap();
        *state
            .fetches
            .entry(format!("branch:{repo}/{branch}"))
            .or_default() += 1;
        if let Some(status) = state.broken_branches.get(repo) {
            return Err(DirectoryError::Api {
                status: *status,
                message: "Server Error".to_string(),
            });
        }
        let branch = state
            .renamed_branches
            .get(&(repo.to_string(), branch.to_string()))
            .map(String::as_str)
            .unwrap_or(branch);
        Ok(state
            .branches
            .get(repo)
            .and_then(|branches| branches.get(branch))
            .map(|_| branch.to_string()))
    }

    async fn branch_protection(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Option<BranchProtection>, DirectoryError> {
        let state = self.state.lock().unwrap();
        match state.branches.get(repo).and_then(|b| b.get(branch)) {
            None => Err(not_found("Branch")),
            Some(ProtectionFixture::Unprotected) => Ok(None),
            Some(ProtectionFixture::Protected(protection)) => Ok(Some(protection.clone())),
            Some(ProtectionFixture::Unreadable(status)) => Err(DirectoryError::Api {
                status: *status,
                message: "Resource not accessible by integration".to_string(),
            }),
        }
    }

    async fn edit_protection(
        &self,
        repo: &str,
        branch: &str,
        settings: &ProtectionSettings,
    ) -> Result<(), DirectoryError> {
        self.mutate(repo, format!("edit_protection {repo}/{branch} {settings}"))?;
        let mut state = self.state.lock().unwrap();
        let fixture = state
            .branches
            .get_mut(repo)
            .and_then(|b| b.get_mut(branch))
            .ok_or_else(|| not_found("Branch"))?;
        let current = match fixture {
            ProtectionFixture::Protected(current) => current.clone(),
            _ => BranchProtection::default(),
        };
        let mut merged = current.flatten();
        merged.merge(settings);
        let updated = nest(&merged);
        *fixture = ProtectionFixture::Protected(BranchProtection {
            enforce_admins: updated.enforce_admins,
            required_pull_request_reviews: updated.required_pull_request_reviews,
            required_status_checks: updated.required_status_checks,
            ..current
        });
        Ok(())
    }
}
