/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::path::Path;

use log::info;

use crate::errors::{GuardError, Result};
use crate::platform::Platform;
use crate::registry::config::{parse_mode, GuardConfig};
use crate::registry::pathname::RelPath;
use crate::registry::{Registry, STATE_FILE_NAME};

use super::{platform_failure, Engine, Failure};

#[derive(Debug, Default)]
pub struct ResetReport {
    pub files_disabled: usize,
    pub collections_disabled: usize,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub files_removed: usize,
    pub collections_removed: usize,
    pub folders_removed: usize,
}

/// Changed configuration fields; `None` leaves a field as it is.
#[derive(Debug, Default, Clone)]
pub struct ConfigChange {
    pub mode: Option<String>,
    pub owner: Option<String>,
    pub group: Option<String>,
}

/// Create the workspace registry. Refuses to touch an existing state file.
pub fn init(
    workspace: &Path,
    platform: &dyn Platform,
    mode: &str,
    owner: &str,
    group: &str,
) -> Result<GuardConfig> {
    if Registry::exists(workspace) {
        return Err(GuardError::Invalid(format!(
            "'{}' already exists",
            STATE_FILE_NAME
        )));
    }
    let config = GuardConfig {
        mode: parse_mode(mode)?,
        owner: owner.to_owned(),
        group: group.to_owned(),
    };
    validate_identities(platform, &config)?;
    let registry = Registry::new(workspace.to_path_buf(), config.clone());
    registry.save(platform)?;
    info!("initialized '{}' in {}", STATE_FILE_NAME, workspace.display());
    Ok(config)
}

fn validate_identities(platform: &dyn Platform, config: &GuardConfig) -> Result<()> {
    if let Some(owner) = config.owner_opt() {
        platform
            .resolve_user(owner)
            .map_err(|err| platform_failure(owner, err))?;
    }
    if let Some(group) = config.group_opt() {
        platform
            .resolve_group(group)
            .map_err(|err| platform_failure(group, err))?;
    }
    Ok(())
}

impl Engine<'_> {
    /// Disable every guard, restoring original permissions, but keep the
    /// registry. Paths are independent; one failed restore does not stop
    /// the others.
    pub fn reset(&mut self) -> Result<ResetReport> {
        let mut report = ResetReport::default();
        let guarded: Vec<RelPath> = self
            .registry
            .files()
            .iter()
            .filter(|entry| entry.guard)
            .map(|entry| entry.path.clone())
            .collect();
        for path in &guarded {
            if !path.to_path(self.registry.workspace()).is_file() {
                report.warnings.push(format!(
                    "'{}' not found on disk, run 'guard cleanup'",
                    path
                ));
                continue;
            }
            match self.disable_one(path) {
                Ok(()) => report.files_disabled += 1,
                Err(error) => report.failures.push(Failure {
                    subject: path.to_string(),
                    error,
                }),
            }
        }

        let collections: Vec<String> = self
            .registry
            .collections()
            .iter()
            .filter(|c| c.guard)
            .map(|c| c.name.clone())
            .collect();
        for name in &collections {
            self.registry
                .collection_mut(name)
                .expect("collection vanished mid-reset")
                .guard = false;
        }
        let folders: Vec<RelPath> = self
            .registry
            .folders()
            .iter()
            .filter(|f| f.guard)
            .map(|f| f.path.clone())
            .collect();
        for path in &folders {
            self.registry
                .folder_by_path_mut(path)
                .expect("folder vanished mid-reset")
                .guard = false;
        }
        report.collections_disabled = collections.len() + folders.len();
        self.save()?;
        Ok(report)
    }

    /// Drop entries whose file vanished, collections that were already
    /// empty when cleanup began (never ones cleanup itself emptied), and
    /// folders whose directory is gone.
    pub fn cleanup(&mut self) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        let empty_before: Vec<String> = self
            .registry
            .collections()
            .iter()
            .filter(|c| c.members.is_empty())
            .map(|c| c.name.clone())
            .collect();

        let missing: Vec<RelPath> = self
            .registry
            .files()
            .iter()
            .filter(|entry| !entry.path.to_path(self.registry.workspace()).is_file())
            .map(|entry| entry.path.clone())
            .collect();
        for path in &missing {
            self.registry.drop_file(path);
            report.files_removed += 1;
        }

        for name in &empty_before {
            self.registry.drop_collection(name);
            report.collections_removed += 1;
        }

        let gone: Vec<RelPath> = self
            .registry
            .folders()
            .iter()
            .filter(|f| !f.path.to_path(self.registry.workspace()).is_dir())
            .map(|f| f.path.clone())
            .collect();
        for path in &gone {
            self.registry.drop_folder(path);
            report.folders_removed += 1;
        }

        self.save()?;
        Ok(report)
    }

    /// Reset, clean up, then delete the state file (clearing its immutable
    /// flag first). Consumes the engine: there is no registry afterwards.
    pub fn uninstall(mut self) -> Result<(ResetReport, CleanupReport)> {
        let reset = self.reset()?;
        let cleanup = self.cleanup()?;
        self.registry.delete_state_file(self.platform)?;
        info!("removed '{}'", STATE_FILE_NAME);
        Ok((reset, cleanup))
    }

    /// Apply configuration changes. The new values only affect future
    /// enables; currently guarded files keep the attributes they were
    /// guarded with, which is worth a warning.
    pub fn config_set(&mut self, change: ConfigChange) -> Result<Vec<String>> {
        let mut config = self.registry.config.clone();
        if let Some(mode) = &change.mode {
            config.mode = parse_mode(mode)?;
        }
        if let Some(owner) = change.owner {
            config.owner = owner;
        }
        if let Some(group) = change.group {
            config.group = group;
        }
        validate_identities(self.platform, &config)?;

        let mut warnings = Vec::new();
        let guarded = self
            .registry
            .files()
            .iter()
            .filter(|entry| entry.guard)
            .count();
        if guarded > 0 {
            warnings.push(format!(
                "{} file(s) currently guarded; the new configuration applies to future enables only",
                guarded
            ));
        }
        self.registry.config = config;
        self.save()?;
        Ok(warnings)
    }
}
