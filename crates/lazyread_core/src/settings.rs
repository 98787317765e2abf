//! Persisted queue settings.
//!
//! # Responsibility
//! - Load and save the JSON settings file.
//! - Derive the policy table, managed schema and organizer options.
//!
//! # Invariants
//! - Missing keys fall back to defaults; a missing file yields defaults.
//! - Settings are validated before any derived value is handed out.
//! - `Never` and `Custom` rules are fixed and cannot be configured.

use crate::model::outcome::Outcome;
use crate::model::policy::{OutcomeRule, Policy, PolicyError, PolicyTable, Target};
use crate::repo::queue_repo::ManagedSchema;
use crate::service::organizer::OrganizerOptions;
use crate::service::priority::PriorityModel;
use log::info;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const NEVER_PERCENT: f64 = 90.0;

/// Errors while loading, saving or validating settings.
#[derive(Debug)]
pub enum SettingsError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
    Policy {
        outcome: Outcome,
        source: PolicyError,
    },
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "settings file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid settings json: {err}"),
            Self::Invalid(message) => write!(f, "invalid settings: {message}"),
            Self::Policy { outcome, source } => {
                write!(f, "invalid policy for {outcome:?}: {source}")
            }
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
            Self::Policy { source, .. } => Some(source),
        }
    }
}

impl From<serde_json::Error> for SettingsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// How a configured outcome computes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMethod {
    Percent,
    Count,
}

/// One configurable outcome policy as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicySetting {
    pub method: PositionMethod,
    pub value: f64,
    pub random: bool,
}

impl PolicySetting {
    const fn percent(value: f64) -> Self {
        Self {
            method: PositionMethod::Percent,
            value,
            random: true,
        }
    }

    pub fn to_policy(&self) -> Result<Policy, PolicyError> {
        let target = match self.method {
            PositionMethod::Percent => Target::percent(self.value)?,
            PositionMethod::Count => Target::count(self.value)?,
        };
        Ok(Policy::new(target, self.random))
    }
}

/// Queue settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub prio_enabled: bool,
    /// Allowed priority labels; the last index is the highest priority.
    pub priorities: Vec<String>,
    /// Organizer label template (`{info}`, `{title}`).
    pub organizer_format: String,
    pub model_name: String,
    pub title_field: String,
    pub prio_field: String,
    pub extract: PolicySetting,
    pub soon: PolicySetting,
    pub soonish: PolicySetting,
    pub later: PolicySetting,
    pub much_later: PolicySetting,
}

impl Default for Settings {
    fn default() -> Self {
        let mut priorities = vec![String::new()];
        priorities.extend((1..=10).map(|value: u32| value.to_string()));

        Self {
            prio_enabled: false,
            priorities,
            organizer_format: "❰ {info} ❱\t{title}".to_string(),
            model_name: "IR3".to_string(),
            title_field: "Title".to_string(),
            prio_field: "Priority".to_string(),
            extract: PolicySetting::percent(30.0),
            soon: PolicySetting::percent(10.0),
            soonish: PolicySetting::percent(25.0),
            later: PolicySetting::percent(50.0),
            much_later: PolicySetting::percent(100.0),
        }
    }
}

impl Settings {
    /// Loads settings from `path`; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "event=settings_load module=settings status=skip reason=missing path={}",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        info!(
            "event=settings_load module=settings status=ok prio_enabled={}",
            settings.prio_enabled
        );
        Ok(settings)
    }

    /// Writes settings to `path` as pretty JSON, creating parent dirs.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        self.validate()?;
        let path = path.as_ref();
        let io_error = |source: std::io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_error)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.priorities.is_empty() {
            return Err(SettingsError::Invalid(
                "priorities must list at least one label".to_string(),
            ));
        }
        for (name, value) in [
            ("modelName", &self.model_name),
            ("titleField", &self.title_field),
            ("prioField", &self.prio_field),
        ] {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid(format!("{name} must not be blank")));
            }
        }
        self.policy_table().map(|_| ())
    }

    /// Policy setting of a configurable outcome.
    pub fn policy_setting(&self, outcome: Outcome) -> Option<&PolicySetting> {
        match outcome {
            Outcome::Extract => Some(&self.extract),
            Outcome::Soon => Some(&self.soon),
            Outcome::Soonish => Some(&self.soonish),
            Outcome::Later => Some(&self.later),
            Outcome::MuchLater => Some(&self.much_later),
            Outcome::Custom | Outcome::Never => None,
        }
    }

    /// Complete outcome -> rule table.
    pub fn policy_table(&self) -> Result<PolicyTable, SettingsError> {
        let mut table = PolicyTable::new();
        for outcome in Outcome::ALL {
            let rule = match outcome {
                Outcome::Custom => OutcomeRule::ManualReorder,
                Outcome::Never => {
                    OutcomeRule::Reposition(Policy::new(Target::Percent(NEVER_PERCENT), true))
                }
                configurable => {
                    let Some(setting) = self.policy_setting(configurable) else {
                        continue;
                    };
                    let policy = setting.to_policy().map_err(|source| SettingsError::Policy {
                        outcome: configurable,
                        source,
                    })?;
                    OutcomeRule::Reposition(policy)
                }
            };
            table.insert(outcome, rule);
        }
        Ok(table)
    }

    pub fn managed_schema(&self) -> ManagedSchema {
        ManagedSchema {
            model_name: self.model_name.clone(),
            title_field: self.title_field.clone(),
            prio_field: self.prio_field.clone(),
            prio_enabled: self.prio_enabled,
        }
    }

    pub fn priority_model(&self) -> PriorityModel {
        PriorityModel::from_labels(&self.priorities)
    }

    pub fn organizer_options(&self) -> OrganizerOptions {
        OrganizerOptions {
            format: self.organizer_format.clone(),
            prio_enabled: self.prio_enabled,
            priority_model: self.priority_model(),
        }
    }
}
