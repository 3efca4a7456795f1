//! Applies the organization policy across every member and repository.

use async_trait::async_trait;
use tracing::info;

use crate::change::Change;
use crate::config::PolicyConfig;
use crate::reconcile::{
    protect_branch, reconcile_membership, reconcile_repo_access, reconcile_repo_settings,
};
use crate::team::Team;
use crate::{Directory, Member, Permission, Result, Scope, TeamRef};

/// Receives changes in the order they are found.
#[async_trait]
pub trait ChangeSink: Send {
    async fn submit(&mut self, change: Change) -> Result<()>;
}

#[async_trait]
impl ChangeSink for Vec<Change> {
    async fn submit(&mut self, change: Change) -> Result<()> {
        self.push(change);
        Ok(())
    }
}

async fn submit_all(sink: &mut dyn ChangeSink, changes: Vec<Change>) -> Result<()> {
    for change in changes {
        sink.submit(change).await?;
    }
    Ok(())
}

pub struct Planner<'a> {
    directory: &'a dyn Directory,
    config: &'a PolicyConfig,
}

impl<'a> Planner<'a> {
    pub fn new(directory: &'a dyn Directory, config: &'a PolicyConfig) -> Self {
        Self { directory, config }
    }

    /// Study organization first, then each code organization.
    pub async fn run(&self, sink: &mut dyn ChangeSink) -> Result<()> {
        self.manage_studies(sink).await?;
        for org in &self.config.code_organizations {
            self.manage_code(org, sink).await?;
        }
        Ok(())
    }

    fn team(&self, slug: &str) -> Team {
        Team::new(Scope::Team(TeamRef::new(
            self.config.organization.clone(),
            slug,
        )))
    }

    /// Team memberships, then per-repository settings, protection and access.
    ///
    /// Protected repositories go to the developers team with the elevated
    /// branch policy; `not_studies` go to editors and everything else to the
    /// default team, both with the baseline policy.
    pub async fn manage_studies(&self, sink: &mut dyn ChangeSink) -> Result<()> {
        let directory = self.directory;
        let config = self.config;
        let mut org = Team::new(Scope::Organization(config.organization.clone()));
        let mut default = self.team(&config.teams.default);
        let mut developers = self.team(&config.teams.developers);
        let mut managers = self.team(&config.teams.managers);
        let mut editors = self.team(&config.teams.editors);

        let org_members = org.members(directory).await?;

        // Bots stay out of the default team to avoid elevating them.
        let everyone: Vec<&Member> = org_members
            .values()
            .filter(|member| !config.bots.contains(&member.login))
            .collect();
        let changes = reconcile_membership(&mut default, directory, everyone).await?;
        submit_all(sink, changes).await?;

        // Allow-listed logins no longer in the organization are skipped.
        for (team, allowed) in [
            (&mut developers, &config.developers),
            (&mut managers, &config.managers),
        ] {
            let listed: Vec<&Member> = allowed
                .iter()
                .filter_map(|login| org_members.get(login))
                .collect();
            let changes = reconcile_membership(team, directory, listed).await?;
            submit_all(sink, changes).await?;
        }

        let repos: Vec<_> = org.repos(directory).await?.values().cloned().collect();
        for repo in &repos {
            info!(repo = %repo.full_name, "checking");
            let changes =
                reconcile_repo_settings(directory, repo, &config.repo_settings).await?;
            submit_all(sink, changes).await?;

            let (team, policy) = if config.is_protected(&repo.full_name) {
                (&mut developers, &config.branch_policies.elevated)
            } else if config.not_studies.contains(&repo.full_name) {
                (&mut editors, &config.branch_policies.baseline)
            } else {
                (&mut default, &config.branch_policies.baseline)
            };

            let changes = protect_branch(directory, repo, None, policy).await?;
            submit_all(sink, changes).await?;
            let changes = reconcile_repo_access(team, directory, repo, Permission::Admin).await?;
            submit_all(sink, changes).await?;
        }
        Ok(())
    }

    /// Every repository of `org` gets the settings policy and the elevated branch policy.
    pub async fn manage_code(&self, org: &str, sink: &mut dyn ChangeSink) -> Result<()> {
        let directory = self.directory;
        let config = self.config;
        let mut code = Team::new(Scope::Organization(org.to_string()));

        let repos: Vec<_> = code.repos(directory).await?.values().cloned().collect();
        for repo in &repos {
            info!(repo = %repo.full_name, "checking");
            let changes =
                reconcile_repo_settings(directory, repo, &config.repo_settings).await?;
            submit_all(sink, changes).await?;
            let changes =
                protect_branch(directory, repo, None, &config.branch_policies.elevated).await?;
            submit_all(sink, changes).await?;
        }
        Ok(())
    }
}
