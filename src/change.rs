use std::fmt;

use serde_json::{Map, Value};

use crate::protection::ProtectionSettings;
use crate::{Directory, DirectoryError, Permission, TeamRef};

/// What a [`Change`] does when applied.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    AddMember {
        team: TeamRef,
        login: String,
    },
    AddRepo {
        team: TeamRef,
        repo: String,
    },
    SetPermission {
        team: TeamRef,
        repo: String,
        permission: Permission,
    },
    EditRepo {
        repo: String,
        settings: Map<String, Value>,
    },
    EditProtection {
        repo: String,
        branch: String,
        settings: ProtectionSettings,
    },
    /// A problem found while analysing. Shown with the other changes, applying it does nothing.
    Report {
        message: String,
    },
}

/// A pending correction. Rendering (`Display`) and applying are separate, so
/// a change can be printed, collected and applied later.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct Change {
    pub action: Action,
}

impl Change {
    pub fn new(action: Action) -> Self {
        Self { action }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::new(Action::Report {
            message: message.into(),
        })
    }

    pub fn is_report(&self) -> bool {
        matches!(self.action, Action::Report { .. })
    }

    pub async fn apply(&self, directory: &dyn Directory) -> Result<(), DirectoryError> {
        match &self.action {
            Action::AddMember { team, login } => directory.add_member(team, login).await,
            Action::AddRepo { team, repo } => directory.add_repo(team, repo).await,
            Action::SetPermission {
                team,
                repo,
                permission,
            } => directory.set_permission(team, repo, *permission).await,
            Action::EditRepo { repo, settings } => directory.edit_repo(repo, settings).await,
            Action::EditProtection {
                repo,
                branch,
                settings,
            } => directory.edit_protection(repo, branch, settings).await,
            Action::Report { .. } => Ok(()),
        }
    }
}

fn short_name(full_name: &str) -> &str {
    full_name
        .split_once('/')
        .map(|(_, name)| name)
        .unwrap_or(full_name)
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::AddMember { team, login } => write!(f, "add {login} to {team} team"),
            Action::AddRepo { team, repo } => {
                write!(f, "add {} repo to {team} team", short_name(repo))
            }
            Action::SetPermission {
                team,
                repo,
                permission,
            } => write!(f, "granted {permission} on {} to {team}", short_name(repo)),
            Action::EditRepo { repo, settings } => {
                let fields: Vec<String> = settings
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect();
                write!(f, "setting repo policy on {repo}:\n{}", fields.join(", "))
            }
            Action::EditProtection {
                repo,
                branch,
                settings,
            } => write!(
                f,
                "setting branch protection on {}/{branch} to:\n{settings}",
                short_name(repo)
            ),
            Action::Report { message } => write!(f, "ERROR: {message}"),
        }
    }
}
