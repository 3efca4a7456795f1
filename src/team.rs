use std::collections::BTreeMap;

use tracing::debug;

use crate::change::{Action, Change};
use crate::{Directory, DirectoryError, Member, Permission, Repository, Scope, TeamRef};

/// An organization or team with its members and repositories loaded on first
/// use. Each collection is fetched at most once; later calls return the same
/// snapshot for the rest of the run.
#[derive(Debug)]
pub struct Team {
    scope: Scope,
    members: Option<BTreeMap<String, Member>>,
    repos: Option<BTreeMap<String, Repository>>,
}

impl Team {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            members: None,
            repos: None,
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn team_ref(&self) -> Result<TeamRef, DirectoryError> {
        match &self.scope {
            Scope::Team(team) => Ok(team.clone()),
            Scope::Organization(org) => Err(DirectoryError::Unexpected(format!(
                "{org} is an organization, not a team"
            ))),
        }
    }

    /// Members keyed by login.
    pub async fn members(
        &mut self,
        directory: &dyn Directory,
    ) -> Result<&BTreeMap<String, Member>, DirectoryError> {
        let members = match self.members.take() {
            Some(members) => members,
            None => {
                debug!(scope = %self.scope, "loading members");
                directory
                    .members(&self.scope)
                    .await?
                    .into_iter()
                    .map(|member| (member.login.clone(), member))
                    .collect()
            }
        };
        let members: &BTreeMap<String, Member> = self.members.insert(members);
        Ok(members)
    }

    /// Repositories keyed by full name.
    pub async fn repos(
        &mut self,
        directory: &dyn Directory,
    ) -> Result<&BTreeMap<String, Repository>, DirectoryError> {
        let repos = match self.repos.take() {
            Some(repos) => repos,
            None => {
                debug!(scope = %self.scope, "loading repos");
                directory
                    .repos(&self.scope)
                    .await?
                    .into_iter()
                    .map(|repo| (repo.full_name.clone(), repo))
                    .collect()
            }
        };
        let repos: &BTreeMap<String, Repository> = self.repos.insert(repos);
        Ok(repos)
    }

    /// Yields a change adding `member` unless they are already in the team.
    /// Fails for an organization scope.
    pub async fn add_member(
        &mut self,
        directory: &dyn Directory,
        member: &Member,
    ) -> Result<Option<Change>, DirectoryError> {
        let team = self.team_ref()?;
        if self.members(directory).await?.contains_key(&member.login) {
            return Ok(None);
        }
        Ok(Some(Change::new(Action::AddMember {
            team,
            login: member.login.clone(),
        })))
    }

    /// Registers `repo` with the team and makes sure the team holds `permission` on it.
    /// Fails for an organization scope.
    pub async fn add_repo(
        &mut self,
        directory: &dyn Directory,
        repo: &Repository,
        permission: Permission,
    ) -> Result<Vec<Change>, DirectoryError> {
        let team = self.team_ref()?;
        let mut changes = vec![];

        if !self.repos(directory).await?.contains_key(&repo.full_name) {
            changes.push(Change::new(Action::AddRepo {
                team: team.clone(),
                repo: repo.full_name.clone(),
            }));
        }

        let current = directory.permission(&team, &repo.full_name).await?;
        let granted = current
            .as_ref()
            .map(|flags| permission.granted_by(flags))
            .unwrap_or(false);
        if !granted {
            changes.push(Change::new(Action::SetPermission {
                team,
                repo: repo.full_name.clone(),
                permission,
            }));
        }

        Ok(changes)
    }
}
