//! The remote directory service the policy is enforced against.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::protection::{BranchProtection, ProtectionSettings};
use crate::{DirectoryError, Member, Permission, Permissions, Repository};

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct TeamRef {
    pub org: String,
    pub slug: String,
}

impl TeamRef {
    pub fn new(org: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for TeamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug)
    }
}

/// Something that owns members and repositories: a whole organization or one
/// of its teams.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Organization(String),
    Team(TeamRef),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Organization(org) => f.write_str(org),
            Scope::Team(team) => write!(f, "{}/{}", team.org, team.slug),
        }
    }
}

/// Operations the reconciliation core needs from GitHub.
///
/// Reads that can legitimately miss (`branch`, `branch_protection`) return
/// `Ok(None)` on 404; every other failure is an `Err`.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn members(&self, scope: &Scope) -> Result<Vec<Member>, DirectoryError>;

    async fn repos(&self, scope: &Scope) -> Result<Vec<Repository>, DirectoryError>;

    async fn add_member(&self, team: &TeamRef, login: &str) -> Result<(), DirectoryError>;

    async fn add_repo(&self, team: &TeamRef, repo: &str) -> Result<(), DirectoryError>;

    async fn set_permission(
        &self,
        team: &TeamRef,
        repo: &str,
        permission: Permission,
    ) -> Result<(), DirectoryError>;

    async fn permission(
        &self,
        team: &TeamRef,
        repo: &str,
    ) -> Result<Option<Permissions>, DirectoryError>;

    /// Current repository settings, as the JSON object GitHub returns.
    async fn repo_settings(&self, repo: &str) -> Result<Map<String, Value>, DirectoryError>;

    async fn edit_repo(&self, repo: &str, settings: &Map<String, Value>)
        -> Result<(), DirectoryError>;

    /// Returns the branch name if the branch exists.
    async fn branch(&self, repo: &str, branch: &str) -> Result<Option<String>, DirectoryError>;

    async fn branch_protection(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Option<BranchProtection>, DirectoryError>;

    /// Sets the given fields of the branch's protection, leaving the others as they are.
    async fn edit_protection(
        &self,
        repo: &str,
        branch: &str,
        settings: &ProtectionSettings,
    ) -> Result<(), DirectoryError>;
}
