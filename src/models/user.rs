//! User, settings and profile image types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::measurement::SimpleMeasurements;

/// Maximum length of a user name
pub const MAX_NAME_LEN: usize = 64;

/// Maximum length of a profile bio
pub const MAX_BIO_LEN: usize = 500;

/// Largest accepted profile image (5 MB)
pub const MAX_PROFILE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreate {
    pub name: String,
}

impl UserCreate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A user with settings, latest measurements and profile image metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFull {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    pub settings: UserSettings,
    pub measurements: SimpleMeasurements,
    pub has_profile_image: bool,
    #[serde(default)]
    pub profile_image: Option<ProfileImage>,
}

/// Per-user preferences, one-to-one with [`User`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub dark_mode: bool,
    pub language: String,
    pub default_measurement_unit: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            language: "en".to_string(),
            default_measurement_unit: "metric".to_string(),
        }
    }
}

impl UserSettings {
    /// Apply the provided fields of an update, leaving the rest untouched
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(dark_mode) = update.dark_mode {
            self.dark_mode = dark_mode;
        }
        if let Some(language) = &update.language {
            self.language = language.clone();
        }
        if let Some(unit) = &update.default_measurement_unit {
            self.default_measurement_unit = unit.clone();
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dark_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_measurement_unit: Option<String>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.dark_mode.is_none()
            && self.language.is_none()
            && self.default_measurement_unit.is_none()
    }
}

/// Body of `PATCH /profile/settings`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub settings: SettingsUpdate,
}

/// Body of `PATCH /profile/name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNameRequest {
    pub name: String,
}

/// Body of `PATCH /profile/bio`; an empty bio clears it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBioRequest {
    pub bio: String,
}

/// Profile image metadata; the bytes are served separately
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImage {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_apply_partial() {
        let mut settings = UserSettings::default();
        settings.apply(&SettingsUpdate {
            dark_mode: Some(true),
            ..Default::default()
        });
        assert!(settings.dark_mode);
        assert_eq!(settings.language, "en");
        assert_eq!(settings.default_measurement_unit, "metric");
    }

    #[test]
    fn test_settings_wire_names() {
        let json = serde_json::to_string(&UserSettings::default()).unwrap();
        assert!(json.contains("\"darkMode\":false"));
        assert!(json.contains("\"defaultMeasurementUnit\":\"metric\""));

        let update: SettingsUpdate = serde_json::from_str(r#"{"language": "sv"}"#).unwrap();
        assert_eq!(update.language.as_deref(), Some("sv"));
        assert!(update.dark_mode.is_none());
        assert!(SettingsUpdate::default().is_empty());
    }
}
