/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use serde::{Deserialize, Serialize};

use crate::errors::GuardError;

/// Per-workspace guard configuration. An empty owner or group means "leave
/// unchanged when enabling a guard".
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    /// Permission bits applied to a file while it is guarded.
    #[serde(rename = "guard_mode", with = "octal_mode")]
    pub mode: u32,
    #[serde(rename = "guard_owner")]
    pub owner: String,
    #[serde(rename = "guard_group")]
    pub group: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        GuardConfig {
            mode: 0o000,
            owner: String::new(),
            group: String::new(),
        }
    }
}

impl GuardConfig {
    pub fn display_mode(&self) -> String {
        format_mode(self.mode)
    }

    pub fn owner_opt(&self) -> Option<&str> {
        non_empty(&self.owner)
    }

    pub fn group_opt(&self) -> Option<&str> {
        non_empty(&self.group)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn format_mode(mode: u32) -> String {
    format!("{:04o}", mode)
}

/// Parse an octal mode string, accepting `644`, `0644` and `0o644`.
/// Anything outside `[0, 0o777]` is rejected.
pub fn parse_mode(input: &str) -> Result<u32, GuardError> {
    let digits = input.strip_prefix("0o").unwrap_or(input);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| {
        GuardError::Invalid(format!("invalid mode '{}': not an octal value", input))
    })?;
    if mode > 0o777 {
        return Err(GuardError::Invalid(format!(
            "invalid mode '{}': must be between 0000 and 0777",
            input
        )));
    }
    Ok(mode)
}

/// Serialize permission bits as a quoted octal string (`"0644"`), the way
/// they appear in the state file.
pub mod octal_mode {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_mode(*mode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_mode(&text).map_err(|err| D::Error::custom(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode_accepts_octal_forms() {
        assert_eq!(Ok(0o644), parse_mode("644").map_err(|e| e.to_string()));
        assert_eq!(Ok(0o644), parse_mode("0644").map_err(|e| e.to_string()));
        assert_eq!(Ok(0o644), parse_mode("0o644").map_err(|e| e.to_string()));
        assert_eq!(Ok(0o000), parse_mode("0000").map_err(|e| e.to_string()));
    }

    #[test]
    fn parse_mode_rejects_bad_input() {
        assert!(parse_mode("999").is_err());
        assert!(parse_mode("1000").is_err());
        assert!(parse_mode("rw-r--r--").is_err());
        assert!(parse_mode("").is_err());
    }

    #[test]
    fn mode_roundtrips_as_quoted_octal() {
        let config = GuardConfig {
            mode: 0o640,
            owner: "alice".to_owned(),
            group: "staff".to_owned(),
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("'0640'"), "unexpected yaml: {}", yaml);
        let back: GuardConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let yaml = "guard_mode: '0644'\nguard_owner: ''\nguard_group: ''\nextra: 1\n";
        assert!(serde_yaml::from_str::<GuardConfig>(yaml).is_err());
    }
}
