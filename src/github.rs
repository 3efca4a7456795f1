//! [`Directory`] backed by the GitHub REST API.

use async_trait::async_trait;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Error;
use crate::protection::{edit_request, BranchProtection, ProtectionSettings};
use crate::{
    Directory, DirectoryError, Member, Permission, Permissions, Repository, Scope, TeamRef,
};

pub const TOKEN_VAR: &str = "ORG_TOKEN";

const PER_PAGE: u32 = 100;

#[derive(serde::Deserialize)]
struct Login {
    login: String,
}

#[derive(serde::Deserialize)]
struct BranchRef {
    name: String,
}

pub struct GithubDirectory {
    client: Octocrab,
}

fn to_repository(repo: octocrab::models::Repository) -> Repository {
    let full_name = match repo.full_name {
        Some(full_name) => full_name,
        None => match &repo.owner {
            Some(owner) => format!("{}/{}", owner.login, repo.name),
            None => repo.name.clone(),
        },
    };
    Repository {
        full_name,
        name: repo.name,
        archived: repo.archived.unwrap_or(false),
    }
}

impl GithubDirectory {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    /// Builds a client from the token in `ORG_TOKEN`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_token(std::env::var(TOKEN_VAR).ok())
    }

    /// Fails with [`Error::MissingToken`] when `token` is absent or empty.
    pub fn from_token(token: Option<String>) -> Result<Self, Error> {
        let token = token
            .filter(|token| !token.is_empty())
            .ok_or(Error::MissingToken)?;
        let client = octocrab::OctocrabBuilder::new()
            .personal_token(token)
            .build()
            .map_err(DirectoryError::from)?;
        Ok(Self::new(client))
    }

    async fn get_all<T: DeserializeOwned>(&self, route: &str) -> Result<Vec<T>, DirectoryError> {
        let mut items = vec![];
        let mut page = 1u32;
        loop {
            let batch: Vec<T> = self
                .get(&format!("{route}?per_page={PER_PAGE}&page={page}"))
                .await?;
            let last = batch.len() < PER_PAGE as usize;
            items.extend(batch);
            if last {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn get<T: DeserializeOwned>(&self, route: &str) -> Result<T, DirectoryError> {
        self.get_optional(route)
            .await?
            .ok_or_else(|| DirectoryError::Api {
                status: 404,
                message: format!("{route} Not Found"),
            })
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        route: &str,
    ) -> Result<Option<T>, DirectoryError> {
        let response = self.client._get(route).await?;
        let status = response.status().as_u16();
        if status == 404 {
            debug!(route, "not found");
            return Ok(None);
        }
        let response = octocrab::map_github_error(response)
            .await
            .map_err(|e| DirectoryError::from_response(status, e))?;
        let body = self.client.body_to_string(response).await?;
        serde_json::from_str(&body).map(Some).map_err(|e| {
            DirectoryError::Unexpected(format!("unexpected payload from {route}: {e}"))
        })
    }

    async fn put<B: Serialize + ?Sized + Sync>(
        &self,
        route: String,
        body: &B,
    ) -> Result<(), DirectoryError> {
        let response = self.client._put(route, Some(body)).await?;
        let status = response.status().as_u16();
        octocrab::map_github_error(response)
            .await
            .map_err(|e| DirectoryError::from_response(status, e))?;
        Ok(())
    }

    async fn org_repos(&self, org: &str) -> Result<Vec<Repository>, DirectoryError> {
        let mut repos = vec![];
        let mut page = 1u32;
        loop {
            let mut response = self
                .client
                .orgs(org)
                .list_repos()
                .page(page)
                .per_page(PER_PAGE as u8)
                .send()
                .await?;
            repos.extend(response.take_items().into_iter().map(to_repository));

            if response.next.is_none() {
                break;
            } else {
                page += 1;
            }
        }
        Ok(repos)
    }
}

#[async_trait]
impl Directory for GithubDirectory {
    async fn members(&self, scope: &Scope) -> Result<Vec<Member>, DirectoryError> {
        let route = match scope {
            Scope::Organization(org) => format!("/orgs/{org}/members"),
            Scope::Team(team) => format!("/orgs/{}/teams/{}/members", team.org, team.slug),
        };
        let logins: Vec<Login> = self.get_all(&route).await?;
        Ok(logins.into_iter().map(|l| Member::new(l.login)).collect())
    }

    async fn repos(&self, scope: &Scope) -> Result<Vec<Repository>, DirectoryError> {
        match scope {
            Scope::Organization(org) => self.org_repos(org).await,
            Scope::Team(team) => {
                let route = format!("/orgs/{}/teams/{}/repos", team.org, team.slug);
                let repos: Vec<octocrab::models::Repository> = self.get_all(&route).await?;
                Ok(repos.into_iter().map(to_repository).collect())
            }
        }
    }

    async fn add_member(&self, team: &TeamRef, login: &str) -> Result<(), DirectoryError> {
        let route = format!("/orgs/{}/teams/{}/memberships/{login}", team.org, team.slug);
        self.put(route, &serde_json::json!({ "role": "member" })).await
    }

    async fn add_repo(&self, team: &TeamRef, repo: &str) -> Result<(), DirectoryError> {
        let route = format!("/orgs/{}/teams/{}/repos/{repo}", team.org, team.slug);
        self.put(route, &serde_json::json!({})).await
    }

    async fn set_permission(
        &self,
        team: &TeamRef,
        repo: &str,
        permission: Permission,
    ) -> Result<(), DirectoryError> {
        let route = format!("/orgs/{}/teams/{}/repos/{repo}", team.org, team.slug);
        self.put(route, &serde_json::json!({ "permission": permission.as_str() }))
            .await
    }

    /// Looks the team up among the repository's teams. GitHub reports a
    /// single role per team; it is mapped to that role's flag only.
    async fn permission(
        &self,
        team: &TeamRef,
        repo: &str,
    ) -> Result<Option<Permissions>, DirectoryError> {
        let Some((owner, name)) = repo.split_once('/') else {
            return Err(DirectoryError::Unexpected(format!(
                "not a full repository name: {repo}"
            )));
        };
        let mut page = 1u32;
        loop {
            let mut response = self
                .client
                .repos(owner, name)
                .list_teams()
                .per_page(PER_PAGE as u8)
                .page(page)
                .send()
                .await?;
            for found in response.take_items() {
                if found.slug == team.slug {
                    debug!(team = %team, repo, role = %found.permission, "team permission");
                    return Ok(Permission::from_role(&found.permission).map(|p| p.flags()));
                }
            }

            if response.next.is_none() {
                return Ok(None);
            } else {
                page += 1;
            }
        }
    }

    async fn repo_settings(&self, repo: &str) -> Result<Map<String, Value>, DirectoryError> {
        let value: Value = self.get(&format!("/repos/{repo}")).await?;
        match value {
            Value::Object(settings) => Ok(settings),
            other => Err(DirectoryError::Unexpected(format!(
                "unexpected repository payload for {repo}: {other}"
            ))),
        }
    }

    async fn edit_repo(
        &self,
        repo: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), DirectoryError> {
        let response = self
            .client
            ._patch(format!("/repos/{repo}"), Some(settings))
            .await?;
        let status = response.status().as_u16();
        octocrab::map_github_error(response)
            .await
            .map_err(|e| DirectoryError::from_response(status, e))?;
        Ok(())
    }

    async fn branch(&self, repo: &str, branch: &str) -> Result<Option<String>, DirectoryError> {
        let found: Option<BranchRef> = self
            .get_optional(&format!("/repos/{repo}/branches/{branch}"))
            .await?;
        Ok(found.map(|b| b.name))
    }

    async fn branch_protection(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Option<BranchProtection>, DirectoryError> {
        self.get_optional(&format!("/repos/{repo}/branches/{branch}/protection"))
            .await
    }

    /// Re-reads the current protection so that the replacing write keeps
    /// whatever `settings` does not mention.
    async fn edit_protection(
        &self,
        repo: &str,
        branch: &str,
        settings: &ProtectionSettings,
    ) -> Result<(), DirectoryError> {
        let current = self.branch_protection(repo, branch).await?;
        let request = edit_request(current.as_ref(), settings);
        let route = format!("/repos/{repo}/branches/{branch}/protection");
        self.put(route, &request).await
    }
}
