use std::collections::BTreeSet;
use std::path::Path;

use serde_json::{Map, Value};

use crate::protection::ProtectionSettings;
use crate::{Error, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Desired state of the organization, loaded once per run.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// The study organization.
    pub organization: String,
    /// Organizations whose repositories are all code repositories.
    #[serde(default)]
    pub code_organizations: Vec<String>,
    /// Accounts never added to the default team.
    #[serde(default)]
    pub bots: BTreeSet<String>,
    #[serde(default)]
    pub developers: BTreeSet<String>,
    #[serde(default)]
    pub managers: BTreeSet<String>,
    #[serde(default)]
    pub protected_repositories: BTreeSet<String>,
    #[serde(default)]
    pub not_studies: BTreeSet<String>,
    #[serde(default)]
    pub teams: TeamSlugs,
    #[serde(default = "default_repo_settings")]
    pub repo_settings: Map<String, Value>,
    #[serde(default)]
    pub branch_policies: BranchPolicies,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TeamSlugs {
    #[serde(default = "default_team")]
    pub default: String,
    #[serde(default = "developers_team")]
    pub developers: String,
    #[serde(default = "managers_team")]
    pub managers: String,
    #[serde(default = "editors_team")]
    pub editors: String,
}

impl Default for TeamSlugs {
    fn default() -> Self {
        Self {
            default: default_team(),
            developers: developers_team(),
            managers: managers_team(),
            editors: editors_team(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BranchPolicies {
    #[serde(default = "ProtectionSettings::baseline")]
    pub baseline: ProtectionSettings,
    #[serde(default = "ProtectionSettings::elevated")]
    pub elevated: ProtectionSettings,
}

impl Default for BranchPolicies {
    fn default() -> Self {
        Self {
            baseline: ProtectionSettings::baseline(),
            elevated: ProtectionSettings::elevated(),
        }
    }
}

fn default_team() -> String {
    "researchers".to_string()
}

fn developers_team() -> String {
    "developers".to_string()
}

fn managers_team() -> String {
    "managers".to_string()
}

fn editors_team() -> String {
    "editors".to_string()
}

/// Applies to every repository.
pub fn default_repo_settings() -> Map<String, Value> {
    let mut settings = Map::new();
    settings.insert("delete_branch_on_merge".to_string(), Value::Bool(true));
    settings
}

impl PolicyConfig {
    /// Reads a YAML config, or TOML when the file ends in `.toml`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let parsed: std::result::Result<Self, BoxError> = if is_toml {
            toml::from_str(&content).map_err(|e| Box::new(e) as BoxError)
        } else {
            serde_yaml::from_str(&content).map_err(|e| Box::new(e) as BoxError)
        };
        parsed.map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_protected(&self, full_name: &str) -> bool {
        self.protected_repositories.contains(full_name)
    }
}
