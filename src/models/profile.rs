//! Typed profile metadata stored alongside the authenticated identity
//!
//! The auth backend keeps profile fields in a free-form `user_metadata` map.
//! This module gives the fields the app cares about a typed shape while
//! preserving any other keys the backend adds (e.g. `email_verified`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Social profile links shown on the profile screen
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
}

impl SocialLinks {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.github.is_none() && self.linkedin.is_none() && self.portfolio.is_none()
    }
}

/// Profile fields kept in the user's metadata
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_links: Option<SocialLinks>,
    /// Keys this crate does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A partial profile change; only the fields that are set are sent
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub college: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_links: Option<SocialLinks>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserMetadata {
    /// Metadata captured by the sign-up form
    #[must_use]
    pub fn for_sign_up(full_name: &str, college: &str) -> Self {
        Self {
            full_name: Some(full_name.trim().to_string()),
            college: Some(college.trim().to_string()),
            ..Self::default()
        }
    }

    /// Shallow-merge `update` over these fields, leaving absent fields untouched
    ///
    /// `social_links` is replaced as a whole when present, matching the
    /// backend's top-level merge of `user_metadata`.
    pub fn merge(&mut self, update: &ProfileUpdate) {
        if let Some(full_name) = &update.full_name {
            self.full_name = Some(full_name.clone());
        }
        if let Some(college) = &update.college {
            self.college = Some(college.clone());
        }
        if let Some(bio) = &update.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(skills) = &update.skills {
            self.skills = Some(skills.clone());
        }
        if let Some(links) = &update.social_links {
            self.social_links = Some(links.clone());
        }
        for (key, value) in &update.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Return a merged copy
    #[must_use]
    pub fn merged(&self, update: &ProfileUpdate) -> Self {
        let mut merged = self.clone();
        merged.merge(update);
        merged
    }

    /// Name shown in headers, falling back to the e-mail local part
    #[must_use]
    pub fn display_name(&self, email: Option<&str>) -> String {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .or_else(|| {
                email
                    .and_then(|e| e.split('@').next())
                    .filter(|local| !local.is_empty())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    /// Up to two upper-case initials for the avatar
    #[must_use]
    pub fn initials(&self, email: Option<&str>) -> String {
        self.display_name(email)
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// Skills as a slice, empty when unset
    #[must_use]
    pub fn skills(&self) -> &[String] {
        self.skills.as_deref().unwrap_or_default()
    }
}

impl ProfileUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn full_name(mut self, full_name: &str) -> Self {
        self.full_name = Some(full_name.to_string());
        self
    }

    #[must_use]
    pub fn college(mut self, college: &str) -> Self {
        self.college = Some(college.to_string());
        self
    }

    #[must_use]
    pub fn bio(mut self, bio: &str) -> Self {
        self.bio = Some(bio.to_string());
        self
    }

    #[must_use]
    pub fn skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = Some(skills.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn social_links(mut self, links: SocialLinks) -> Self {
        self.social_links = Some(links);
        self
    }

    /// Whether the update carries no fields at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.college.is_none()
            && self.bio.is_none()
            && self.skills.is_none()
            && self.social_links.is_none()
            && self.extra.is_empty()
    }
}

impl From<UserMetadata> for ProfileUpdate {
    fn from(metadata: UserMetadata) -> Self {
        Self {
            full_name: metadata.full_name,
            college: metadata.college,
            bio: metadata.bio,
            skills: metadata.skills,
            social_links: metadata.social_links,
            extra: metadata.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut metadata = UserMetadata {
            college: Some("X".to_string()),
            skills: Some(vec!["A".to_string()]),
            ..UserMetadata::default()
        };

        metadata.merge(&ProfileUpdate::new().skills(["A", "B"]));

        assert_eq!(metadata.college.as_deref(), Some("X"));
        assert_eq!(metadata.skills(), ["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_merge_replaces_social_links_whole() {
        let mut metadata = UserMetadata {
            social_links: Some(SocialLinks {
                github: Some("gh".to_string()),
                linkedin: Some("li".to_string()),
                portfolio: None,
            }),
            ..UserMetadata::default()
        };

        metadata.merge(&ProfileUpdate::new().social_links(SocialLinks {
            portfolio: Some("site".to_string()),
            ..SocialLinks::default()
        }));

        let links = metadata.social_links.unwrap();
        assert_eq!(links.github, None);
        assert_eq!(links.portfolio.as_deref(), Some("site"));
    }

    #[test]
    fn test_update_serializes_only_present_keys() {
        let update = ProfileUpdate::new().bio("Builder");
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({"bio": "Builder"}));
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let metadata: UserMetadata =
            serde_json::from_value(json!({"college": "X", "sub": "abc"})).unwrap();
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value, json!({"college": "X", "sub": "abc"}));
    }

    #[test]
    fn test_display_name_and_initials() {
        let named = UserMetadata::for_sign_up("  John Doe ", "Your College");
        assert_eq!(named.display_name(None), "John Doe");
        assert_eq!(named.initials(None), "JD");

        let anonymous = UserMetadata::default();
        assert_eq!(anonymous.display_name(Some("ada@example.com")), "ada");
        assert_eq!(anonymous.initials(Some("ada@example.com")), "A");
        assert_eq!(anonymous.display_name(None), "Anonymous");
    }

    #[test]
    fn test_empty_update() {
        assert!(ProfileUpdate::new().is_empty());
        assert!(!ProfileUpdate::new().college("Y").is_empty());
    }
}
