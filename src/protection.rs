//! Branch protection in its two GitHub shapes.
//!
//! GitHub returns protection nested into independent sub-objects
//! ([`BranchProtection`]) but accepts edits as a flat set of fields
//! ([`ProtectionSettings`]). Comparisons only ever happen on the flat shape;
//! [`BranchProtection::flatten`] is the one way to get there.

use std::fmt;

/// Protection as read from `GET /repos/{owner}/{repo}/branches/{branch}/protection`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BranchProtection {
    #[serde(default)]
    pub enforce_admins: Option<EnabledSetting>,
    #[serde(default)]
    pub required_pull_request_reviews: Option<PullRequestReviews>,
    #[serde(default)]
    pub required_status_checks: Option<StatusChecks>,
    #[serde(default)]
    pub restrictions: Option<PushRestrictions>,
    #[serde(default)]
    pub required_linear_history: Option<EnabledSetting>,
    #[serde(default)]
    pub allow_force_pushes: Option<EnabledSetting>,
    #[serde(default)]
    pub allow_deletions: Option<EnabledSetting>,
    #[serde(default)]
    pub block_creations: Option<EnabledSetting>,
    #[serde(default)]
    pub required_conversation_resolution: Option<EnabledSetting>,
    #[serde(default)]
    pub lock_branch: Option<EnabledSetting>,
    #[serde(default)]
    pub allow_fork_syncing: Option<EnabledSetting>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct EnabledSetting {
    pub enabled: bool,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PullRequestReviews {
    #[serde(default)]
    pub dismissal_restrictions: Option<DismissalRestrictions>,
    #[serde(default)]
    pub dismiss_stale_reviews: bool,
    #[serde(default)]
    pub require_code_owner_reviews: bool,
    #[serde(default)]
    pub required_approving_review_count: Option<u32>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DismissalRestrictions {
    #[serde(default)]
    pub users: Vec<LoginRef>,
    #[serde(default)]
    pub teams: Vec<SlugRef>,
}

/// Who may push to the branch. Not managed here, only carried across edits.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PushRestrictions {
    #[serde(default)]
    pub users: Vec<LoginRef>,
    #[serde(default)]
    pub teams: Vec<SlugRef>,
    #[serde(default)]
    pub apps: Vec<SlugRef>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct LoginRef {
    pub login: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct SlugRef {
    pub slug: String,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatusChecks {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub contexts: Vec<String>,
}

impl BranchProtection {
    /// Projects the nested read shape onto the flat edit shape. Missing
    /// sub-objects leave their fields unset.
    pub fn flatten(&self) -> ProtectionSettings {
        let reviews = self.required_pull_request_reviews.as_ref();
        let dismissals = reviews.and_then(|r| r.dismissal_restrictions.as_ref());
        let checks = self.required_status_checks.as_ref();

        ProtectionSettings {
            enforce_admins: self.enforce_admins.as_ref().map(|s| s.enabled),
            dismissal_users: dismissals
                .map(|d| d.users.iter().map(|u| u.login.clone()).collect()),
            dismissal_teams: dismissals
                .map(|d| d.teams.iter().map(|t| t.slug.clone()).collect()),
            dismiss_stale_reviews: reviews.map(|r| r.dismiss_stale_reviews),
            require_code_owner_reviews: reviews.map(|r| r.require_code_owner_reviews),
            required_approving_review_count: reviews
                .and_then(|r| r.required_approving_review_count),
            strict: checks.map(|c| c.strict),
            contexts: checks.map(|c| c.contexts.clone()),
        }
    }

    /// The settings outside [`ProtectionSettings`], in write shape.
    pub fn unmanaged(&self) -> UnmanagedProtection {
        let enabled = |setting: &Option<EnabledSetting>| setting.as_ref().map(|s| s.enabled);
        UnmanagedProtection {
            restrictions: self.restrictions.as_ref().map(|r| RestrictionsRequest {
                users: r.users.iter().map(|u| u.login.clone()).collect(),
                teams: r.teams.iter().map(|t| t.slug.clone()).collect(),
                apps: r.apps.iter().map(|a| a.slug.clone()).collect(),
            }),
            required_linear_history: enabled(&self.required_linear_history),
            allow_force_pushes: enabled(&self.allow_force_pushes),
            allow_deletions: enabled(&self.allow_deletions),
            block_creations: enabled(&self.block_creations),
            required_conversation_resolution: enabled(&self.required_conversation_resolution),
            lock_branch: enabled(&self.lock_branch),
            allow_fork_syncing: enabled(&self.allow_fork_syncing),
        }
    }
}

/// Body that sets `settings` on a branch currently protected by `current`.
///
/// The write endpoint replaces the whole configuration, so `settings` is
/// overlaid on the current flat fields and everything else GitHub reported
/// is sent back as it was.
pub fn edit_request(
    current: Option<&BranchProtection>,
    settings: &ProtectionSettings,
) -> ProtectionRequest {
    let mut merged = current.map(BranchProtection::flatten).unwrap_or_default();
    merged.merge(settings);
    ProtectionRequest {
        unmanaged: current.map(BranchProtection::unmanaged).unwrap_or_default(),
        ..merged.to_request()
    }
}

/// Flat protection fields, as accepted by a protection edit. `None` means
/// "not set" when read and "leave alone" when desired.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProtectionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_admins: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissal_users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissal_teams: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismiss_stale_reviews: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_code_owner_reviews: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_approving_review_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

fn changed<T: PartialEq + Clone>(current: &Option<T>, desired: &Option<T>) -> Option<T> {
    match desired {
        Some(value) if current.as_ref() != Some(value) => Some(value.clone()),
        _ => None,
    }
}

fn overlay<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        target.clone_from(value);
    }
}

impl ProtectionSettings {
    /// Applies to every protected branch: admins may not bypass protection.
    pub fn baseline() -> Self {
        Self {
            enforce_admins: Some(true),
            ..Self::default()
        }
    }

    /// Baseline plus one required approving review.
    pub fn elevated() -> Self {
        Self {
            required_approving_review_count: Some(1),
            ..Self::baseline()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The fields of `desired` that `self` does not already match.
    pub fn drift(&self, desired: &ProtectionSettings) -> ProtectionSettings {
        ProtectionSettings {
            enforce_admins: changed(&self.enforce_admins, &desired.enforce_admins),
            dismissal_users: changed(&self.dismissal_users, &desired.dismissal_users),
            dismissal_teams: changed(&self.dismissal_teams, &desired.dismissal_teams),
            dismiss_stale_reviews: changed(
                &self.dismiss_stale_reviews,
                &desired.dismiss_stale_reviews,
            ),
            require_code_owner_reviews: changed(
                &self.require_code_owner_reviews,
                &desired.require_code_owner_reviews,
            ),
            required_approving_review_count: changed(
                &self.required_approving_review_count,
                &desired.required_approving_review_count,
            ),
            strict: changed(&self.strict, &desired.strict),
            contexts: changed(&self.contexts, &desired.contexts),
        }
    }

    /// Overwrites every field that is set in `update`.
    pub fn merge(&mut self, update: &ProtectionSettings) {
        overlay(&mut self.enforce_admins, &update.enforce_admins);
        overlay(&mut self.dismissal_users, &update.dismissal_users);
        overlay(&mut self.dismissal_teams, &update.dismissal_teams);
        overlay(&mut self.dismiss_stale_reviews, &update.dismiss_stale_reviews);
        overlay(
            &mut self.require_code_owner_reviews,
            &update.require_code_owner_reviews,
        );
        overlay(
            &mut self.required_approving_review_count,
            &update.required_approving_review_count,
        );
        overlay(&mut self.strict, &update.strict);
        overlay(&mut self.contexts, &update.contexts);
    }

    pub fn to_request(&self) -> ProtectionRequest {
        let reviews = if self.dismissal_users.is_some()
            || self.dismissal_teams.is_some()
            || self.dismiss_stale_reviews.is_some()
            || self.require_code_owner_reviews.is_some()
            || self.required_approving_review_count.is_some()
        {
            let dismissal_restrictions =
                if self.dismissal_users.is_some() || self.dismissal_teams.is_some() {
                    Some(DismissalRequest {
                        users: self.dismissal_users.clone().unwrap_or_default(),
                        teams: self.dismissal_teams.clone().unwrap_or_default(),
                    })
                } else {
                    None
                };
            Some(ReviewsRequest {
                dismissal_restrictions,
                dismiss_stale_reviews: self.dismiss_stale_reviews.unwrap_or(false),
                require_code_owner_reviews: self.require_code_owner_reviews.unwrap_or(false),
                required_approving_review_count: self.required_approving_review_count,
            })
        } else {
            None
        };

        let status_checks = if self.strict.is_some() || self.contexts.is_some() {
            Some(StatusChecks {
                strict: self.strict.unwrap_or(false),
                contexts: self.contexts.clone().unwrap_or_default(),
            })
        } else {
            None
        };

        ProtectionRequest {
            required_status_checks: status_checks,
            enforce_admins: self.enforce_admins,
            required_pull_request_reviews: reviews,
            unmanaged: UnmanagedProtection::default(),
        }
    }
}

impl fmt::Display for ProtectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<String> = vec![];
        if let Some(value) = self.enforce_admins {
            fields.push(format!("enforce_admins={value}"));
        }
        if let Some(value) = &self.dismissal_users {
            fields.push(format!("dismissal_users=[{}]", value.join(", ")));
        }
        if let Some(value) = &self.dismissal_teams {
            fields.push(format!("dismissal_teams=[{}]", value.join(", ")));
        }
        if let Some(value) = self.dismiss_stale_reviews {
            fields.push(format!("dismiss_stale_reviews={value}"));
        }
        if let Some(value) = self.require_code_owner_reviews {
            fields.push(format!("require_code_owner_reviews={value}"));
        }
        if let Some(value) = self.required_approving_review_count {
            fields.push(format!("required_approving_review_count={value}"));
        }
        if let Some(value) = self.strict {
            fields.push(format!("strict={value}"));
        }
        if let Some(value) = &self.contexts {
            fields.push(format!("contexts=[{}]", value.join(", ")));
        }
        f.write_str(&fields.join(", "))
    }
}

/// Body of `PUT /repos/{owner}/{repo}/branches/{branch}/protection`. GitHub
/// requires the three managed groups and `restrictions` to be present,
/// `null` disables a group.
#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct ProtectionRequest {
    pub required_status_checks: Option<StatusChecks>,
    pub enforce_admins: Option<bool>,
    pub required_pull_request_reviews: Option<ReviewsRequest>,
    #[serde(flatten)]
    pub unmanaged: UnmanagedProtection,
}

/// Protection fields that are never compared or changed. Unset flags are
/// left out of the body.
#[derive(serde::Serialize, Debug, Clone, Default, PartialEq)]
pub struct UnmanagedProtection {
    pub restrictions: Option<RestrictionsRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_linear_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_force_pushes: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_deletions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_creations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_conversation_resolution: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_fork_syncing: Option<bool>,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct RestrictionsRequest {
    pub users: Vec<String>,
    pub teams: Vec<String>,
    pub apps: Vec<String>,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct ReviewsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissal_restrictions: Option<DismissalRequest>,
    pub dismiss_stale_reviews: bool,
    pub require_code_owner_reviews: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_approving_review_count: Option<u32>,
}

#[derive(serde::Serialize, Debug, Clone, PartialEq)]
pub struct DismissalRequest {
    pub users: Vec<String>,
    pub teams: Vec<String>,
}
