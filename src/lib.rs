use std::fmt;

pub mod change;
pub mod config;
pub mod directory;
pub mod error;
pub mod execute;
pub mod github;
pub mod plan;
pub mod protection;
pub mod reconcile;
pub mod team;

pub use change::{Action, Change};
pub use directory::{Directory, Scope, TeamRef};
pub use error::{DirectoryError, Error, Result};

/// A user of the organization, identified by login.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Member {
    pub login: String,
}

impl Member {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    pub name: String,
    pub archived: bool,
}

impl Repository {
    pub fn new(full_name: impl Into<String>, archived: bool) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .split_once('/')
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| full_name.clone());
        Self {
            full_name,
            name,
            archived,
        }
    }

    pub fn owner(&self) -> &str {
        self.full_name
            .split_once('/')
            .map(|(owner, _)| owner)
            .unwrap_or_default()
    }
}

/// Capability flags a team holds on a repository, as GitHub reports them.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub maintain: bool,
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub triage: bool,
    #[serde(default)]
    pub pull: bool,
}

/// A team's access level on a repository.
///
/// GitHub reports access as independent capability flags, so a grant is only
/// satisfied by its own flag: `admin` does not imply `push`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Pull,
    Triage,
    Push,
    Maintain,
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Pull => "pull",
            Permission::Triage => "triage",
            Permission::Push => "push",
            Permission::Maintain => "maintain",
            Permission::Admin => "admin",
        }
    }

    pub fn from_role(role: &str) -> Option<Self> {
        let permission = match role {
            "pull" | "read" => Permission::Pull,
            "triage" => Permission::Triage,
            "push" | "write" => Permission::Push,
            "maintain" => Permission::Maintain,
            "admin" => Permission::Admin,
            _ => return None,
        };
        Some(permission)
    }

    pub fn granted_by(&self, flags: &Permissions) -> bool {
        match self {
            Permission::Pull => flags.pull,
            Permission::Triage => flags.triage,
            Permission::Push => flags.push,
            Permission::Maintain => flags.maintain,
            Permission::Admin => flags.admin,
        }
    }

    /// Flag set with only this permission's flag raised.
    pub fn flags(&self) -> Permissions {
        Permissions {
            admin: *self == Permission::Admin,
            maintain: *self == Permission::Maintain,
            push: *self == Permission::Push,
            triage: *self == Permission::Triage,
            pull: *self == Permission::Pull,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
