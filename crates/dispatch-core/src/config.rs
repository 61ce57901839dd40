use crate::classifier::RiskRules;
use crate::error::Result;
use crate::filter::ReplyMarkers;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared mailbox the dispatcher sends on behalf of.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    /// Fixed recipient of every SLA escalation.
    #[serde(default = "default_manager")]
    pub manager: String,
    /// Folder handled tickets are moved into.
    #[serde(default = "default_processed_folder")]
    pub processed_folder: String,
    #[serde(default = "default_sla_minutes")]
    pub sla_minutes: u32,
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_body_excerpt")]
    pub body_excerpt_chars: usize,
    #[serde(default = "default_watchdog_subject")]
    pub watchdog_subject_chars: usize,
    #[serde(default)]
    pub rules: RiskRules,
    #[serde(default)]
    pub filter: ReplyMarkers,
}

fn default_mailbox() -> String {
    "Health:HelpdeskSupportTeam".to_string()
}

fn default_manager() -> String {
    "manager@example.com".to_string()
}

fn default_processed_folder() -> String {
    "Done".to_string()
}

fn default_sla_minutes() -> u32 {
    20
}

fn default_check_interval() -> u64 {
    60
}

fn default_body_excerpt() -> usize {
    500
}

fn default_watchdog_subject() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox: default_mailbox(),
            manager: default_manager(),
            processed_folder: default_processed_folder(),
            sla_minutes: default_sla_minutes(),
            check_interval_seconds: default_check_interval(),
            body_excerpt_chars: default_body_excerpt(),
            watchdog_subject_chars: default_watchdog_subject(),
            rules: RiskRules::default(),
            filter: ReplyMarkers::default(),
        }
    }
}

impl Config {
    /// Load `.dispatch/config.yaml`; a missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn sla_limit(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.sla_minutes))
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.sla_minutes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "sla_minutes is 0: every risk ticket would breach on the next scan"
                    .to_string(),
            });
        }

        if self.check_interval_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "check_interval_seconds must be greater than 0".to_string(),
            });
        }

        if !self.manager.contains('@') {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "manager '{}' does not look like a mail address",
                    self.manager
                ),
            });
        }

        for (name, words) in self.rules.named_sets() {
            if words.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("rules.{name} is empty: the matching rules never fire"),
                });
            }
        }

        // A word in two sets makes rule precedence surprising.
        let mut seen: HashMap<String, &str> = HashMap::new();
        for (name, words) in self.rules.named_sets() {
            for word in words {
                let word = word.to_lowercase();
                match seen.get(&word) {
                    Some(other) if *other != name => warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("word '{word}' appears in both rules.{other} and rules.{name}"),
                    }),
                    Some(_) => {}
                    None => {
                        seen.insert(word, name);
                    }
                }
            }
        }

        if self.filter.reply_prefixes.is_empty() && self.filter.tag_markers.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "filter has no reply prefixes or tag markers: staff replies will be dispatched as new tickets".to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.sla_minutes, 20);
        assert_eq!(cfg.check_interval_seconds, 60);
        assert_eq!(cfg.manager, "manager@example.com");
        assert_eq!(cfg.processed_folder, "Done");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".dispatch")).unwrap();
        std::fs::write(
            dir.path().join(".dispatch/config.yaml"),
            "sla_minutes: 45\nmanager: lead@clinic.example\n",
        )
        .unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.sla_minutes, 45);
        assert_eq!(cfg.manager, "lead@clinic.example");
        assert_eq!(cfg.body_excerpt_chars, 500);
        assert!(cfg.rules.actions.contains("delete"));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = Config {
            sla_minutes: 5,
            ..Config::default()
        };
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.sla_minutes, 5);
        assert_eq!(loaded.rules.urgency, cfg.rules.urgency);
    }

    #[test]
    fn default_config_is_clean() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn zero_sla_is_an_error() {
        let cfg = Config {
            sla_minutes: 0,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("sla_minutes")));
    }

    #[test]
    fn overlapping_word_sets_warn() {
        let mut cfg = Config::default();
        cfg.rules.urgency.insert("delete".to_string());
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.message.contains("'delete'")));
    }
}
