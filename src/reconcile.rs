//! Comparison of desired policy against observed state.
//!
//! Each reconciler returns exactly the changes needed to converge, and
//! nothing for state that already matches. None of them apply anything.

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::change::{Action, Change};
use crate::protection::{BranchProtection, ProtectionSettings};
use crate::team::Team;
use crate::{Directory, DirectoryError, Member, Permission, Repository};

/// Branch names tried when no branch is given.
pub const DEFAULT_BRANCHES: [&str; 2] = ["master", "main"];

/// Adds every desired member missing from `team`. Never removes anyone.
pub async fn reconcile_membership<'a>(
    team: &mut Team,
    directory: &dyn Directory,
    desired: impl IntoIterator<Item = &'a Member>,
) -> Result<Vec<Change>, DirectoryError> {
    let mut changes = vec![];
    for member in desired {
        changes.extend(team.add_member(directory, member).await?);
    }
    Ok(changes)
}

pub async fn reconcile_repo_access(
    team: &mut Team,
    directory: &dyn Directory,
    repo: &Repository,
    permission: Permission,
) -> Result<Vec<Change>, DirectoryError> {
    team.add_repo(directory, repo, permission).await
}

/// One combined edit for all drifted settings. Archived repositories are left alone.
pub async fn reconcile_repo_settings(
    directory: &dyn Directory,
    repo: &Repository,
    policy: &Map<String, Value>,
) -> Result<Vec<Change>, DirectoryError> {
    if repo.archived || policy.is_empty() {
        return Ok(vec![]);
    }

    let current = directory.repo_settings(&repo.full_name).await?;
    let to_change: Map<String, Value> = policy
        .iter()
        .filter(|(name, value)| current.get(name.as_str()) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    if to_change.is_empty() {
        return Ok(vec![]);
    }
    Ok(vec![Change::new(Action::EditRepo {
        repo: repo.full_name.clone(),
        settings: to_change,
    })])
}

/// Where a repository stands relative to the desired branch protection,
/// one state per branch found.
#[derive(Debug)]
pub enum ProtectionState {
    /// None of the candidate branches exist.
    NoDefaultBranch { candidates: Vec<String> },
    /// No protection configured; all of the desired policy applies.
    Unprotected {
        branch: String,
        settings: ProtectionSettings,
    },
    Matching { branch: String },
    /// Protected, but these fields differ.
    Drifted {
        branch: String,
        settings: ProtectionSettings,
    },
    Unreadable { branch: String, error: DirectoryError },
}

impl ProtectionState {
    pub fn assess(
        branch: String,
        current: Result<Option<BranchProtection>, DirectoryError>,
        desired: &ProtectionSettings,
    ) -> Self {
        match current {
            Ok(None) => ProtectionState::Unprotected {
                branch,
                settings: desired.clone(),
            },
            Ok(Some(protection)) => {
                let settings = protection.flatten().drift(desired);
                if settings.is_empty() {
                    ProtectionState::Matching { branch }
                } else {
                    ProtectionState::Drifted { branch, settings }
                }
            }
            Err(error) => ProtectionState::Unreadable { branch, error },
        }
    }

    /// What to do about `repo` in this state, if anything.
    pub fn into_change(self, repo: &Repository) -> Option<Change> {
        match self {
            ProtectionState::NoDefaultBranch { candidates } => {
                error!(repo = %repo.full_name, "no default branch found");
                Some(Change::report(format!(
                    "Could not find [{}] branches in {}",
                    candidates.join(", "),
                    repo.full_name
                )))
            }
            ProtectionState::Matching { branch } => {
                debug!(repo = %repo.full_name, %branch, "branch protection up to date");
                None
            }
            ProtectionState::Unprotected { branch, settings }
            | ProtectionState::Drifted { branch, settings } => {
                Some(Change::new(Action::EditProtection {
                    repo: repo.full_name.clone(),
                    branch,
                    settings,
                }))
            }
            // Seen on private repositories forked into the organization.
            ProtectionState::Unreadable { branch, error } => {
                warn!(repo = %repo.full_name, %branch, %error, "cannot read branch protection");
                Some(Change::report(format!(
                    "exception getting branch protection on {}/{branch}\n{error}",
                    repo.full_name
                )))
            }
        }
    }
}

/// Audits protection on `branch`, or on both `master` and `main` when no
/// branch is given. `enforce_admins` is always required, whatever `policy` says.
///
/// A candidate may resolve to another branch's name when GitHub redirects a
/// renamed branch; each resolved branch is audited once.
pub async fn protect_branch(
    directory: &dyn Directory,
    repo: &Repository,
    branch: Option<&str>,
    policy: &ProtectionSettings,
) -> Result<Vec<Change>, DirectoryError> {
    let desired = ProtectionSettings {
        enforce_admins: Some(true),
        ..policy.clone()
    };

    let candidates: Vec<&str> = match branch {
        Some(branch) => vec![branch],
        None => DEFAULT_BRANCHES.to_vec(),
    };

    let mut branches: Vec<String> = vec![];
    for candidate in &candidates {
        if let Some(name) = directory.branch(&repo.full_name, candidate).await? {
            if !branches.contains(&name) {
                branches.push(name);
            }
        }
    }

    let mut states = vec![];
    if branches.is_empty() {
        states.push(ProtectionState::NoDefaultBranch {
            candidates: candidates.iter().map(ToString::to_string).collect(),
        });
    }
    for branch in branches {
        let current = directory.branch_protection(&repo.full_name, &branch).await;
        states.push(ProtectionState::assess(branch, current, &desired));
    }

    Ok(states
        .into_iter()
        .filter_map(|state| state.into_change(repo))
        .collect())
}
