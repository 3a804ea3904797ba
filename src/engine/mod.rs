/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

pub mod collections;
pub mod files;
pub mod folders;
pub mod maintenance;

use std::path::PathBuf;

use log::{debug, info};

use crate::errors::{GuardError, Result};
use crate::platform::{Platform, PlatformError};
use crate::registry::pathname::RelPath;
use crate::registry::Registry;

/// Executes every user-facing operation as a transaction against the
/// registry and the platform. Each path is its own micro-transaction:
/// a failed path is rolled back on disk and in memory, and the registry is
/// persisted exactly once per operation, after all attempts.
pub struct Engine<'a> {
    pub registry: Registry,
    platform: &'a dyn Platform,
}

/// One ordered line of operation output. File lines always precede the
/// summary line of the collection or folder they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    FileEnabled(RelPath),
    FileDisabled(RelPath),
    CollectionEnabled(String),
    CollectionDisabled(String),
    FolderEnabled(RelPath),
    FolderDisabled(RelPath),
}

#[derive(Debug)]
pub struct Failure {
    pub subject: String,
    pub error: GuardError,
}

/// Aggregate outcome of a guard-changing operation.
#[derive(Debug, Default)]
pub struct GuardReport {
    pub lines: Vec<ReportLine>,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
    /// File targets toggled directly (not through a collection or folder);
    /// drives the `Guard enabled for N file(s)` summary.
    pub standalone_enabled: usize,
    pub standalone_disabled: usize,
}

impl GuardReport {
    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn merge(&mut self, other: GuardReport) {
        self.lines.extend(other.lines);
        self.warnings.extend(other.warnings);
        self.failures.extend(other.failures);
        self.standalone_enabled += other.standalone_enabled;
        self.standalone_disabled += other.standalone_disabled;
    }
}

pub(crate) fn platform_failure(subject: &str, err: PlatformError) -> GuardError {
    match err {
        PlatformError::Denied => GuardError::Denied(format!("'{}'", subject)),
        PlatformError::NotFound => GuardError::NotFound(format!("'{}'", subject)),
        PlatformError::Unsupported => GuardError::Unsupported(format!("'{}'", subject)),
        PlatformError::Other(msg) => GuardError::Invalid(format!("'{}': {}", subject, msg)),
    }
}

impl<'a> Engine<'a> {
    pub fn new(registry: Registry, platform: &'a dyn Platform) -> Self {
        Engine { registry, platform }
    }

    /// Load the workspace registry and wrap it.
    pub fn open(workspace: PathBuf, platform: &'a dyn Platform) -> Result<Self> {
        let registry = Registry::load(&workspace)?;
        Ok(Engine { registry, platform })
    }

    pub fn save(&self) -> Result<()> {
        self.registry.save(self.platform)
    }

    fn abs(&self, path: &RelPath) -> PathBuf {
        path.to_path(self.registry.workspace())
    }

    /// Register `path`, capturing its current attributes into the
    /// `original_*` fields. A second registration of the same path is a
    /// no-op that leaves the first capture untouched.
    pub(crate) fn capture_and_register(&mut self, path: &RelPath) -> Result<bool> {
        if self.registry.file(path).is_some() {
            return Ok(false);
        }
        let abs = self.abs(path);
        let stat = self
            .platform
            .stat(&abs)
            .map_err(|err| platform_failure(path.as_str(), err))?;
        if !stat.is_regular {
            return Err(GuardError::Invalid(format!(
                "'{}' is not a regular file",
                path
            )));
        }
        let owner = self
            .platform
            .user_name(stat.uid)
            .unwrap_or_else(|| stat.uid.to_string());
        let group = self
            .platform
            .group_name(stat.gid)
            .unwrap_or_else(|| stat.gid.to_string());
        debug!(
            "registering '{}' (mode {:04o}, {}:{})",
            path, stat.mode, owner, group
        );
        self.registry.register_file(path.clone(), stat.mode, owner, group);
        Ok(true)
    }

    /// Transition one file `guard: false -> true`. Platform order: chown,
    /// chmod, set immutable. A failed step undoes the completed ones from
    /// the pre-mutation snapshot and leaves the registry untouched.
    pub(crate) fn enable_one(&mut self, path: &RelPath) -> Result<()> {
        let abs = self.abs(path);
        let snapshot = self
            .platform
            .stat(&abs)
            .map_err(|err| platform_failure(path.as_str(), err))?;
        let config = self.registry.config.clone();

        let mut chowned = false;
        if config.owner_opt().is_some() || config.group_opt().is_some() {
            self.platform
                .chown(&abs, config.owner_opt(), config.group_opt())
                .map_err(|err| platform_failure(path.as_str(), err))?;
            chowned = true;
        }
        if let Err(err) = self.platform.chmod(&abs, config.mode) {
            if chowned {
                self.restore_ownership(path, snapshot.uid, snapshot.gid);
            }
            return Err(platform_failure(path.as_str(), err));
        }
        if let Err(err) = self.platform.set_immutable(&abs, true) {
            let _ = self.platform.chmod(&abs, snapshot.mode);
            if chowned {
                self.restore_ownership(path, snapshot.uid, snapshot.gid);
            }
            return Err(platform_failure(path.as_str(), err));
        }

        self.registry
            .file_mut(path)
            .expect("enable of unregistered file")
            .guard = true;
        info!("guard enabled for '{}'", path);
        Ok(())
    }

    /// Transition one file `guard: true -> false`, restoring the attributes
    /// captured at registration. A failed step re-applies the guard state
    /// on disk best-effort; the registry keeps `guard: true`.
    pub(crate) fn disable_one(&mut self, path: &RelPath) -> Result<()> {
        let abs = self.abs(path);
        let entry = self
            .registry
            .file(path)
            .expect("disable of unregistered file");
        let original_mode = entry.original_mode;
        let original_owner = entry.original_owner.clone();
        let original_group = entry.original_group.clone();
        let config_mode = self.registry.config.mode;

        self.platform
            .set_immutable(&abs, false)
            .map_err(|err| platform_failure(path.as_str(), err))?;
        if let Err(err) = self.platform.chmod(&abs, original_mode) {
            let _ = self.platform.set_immutable(&abs, true);
            return Err(platform_failure(path.as_str(), err));
        }
        let owner = non_empty(&original_owner);
        let group = non_empty(&original_group);
        if owner.is_some() || group.is_some() {
            if let Err(err) = self.platform.chown(&abs, owner, group) {
                let _ = self.platform.chmod(&abs, config_mode);
                let _ = self.platform.set_immutable(&abs, true);
                return Err(platform_failure(path.as_str(), err));
            }
        }

        self.registry
            .file_mut(path)
            .expect("disable of unregistered file")
            .guard = false;
        info!("guard disabled for '{}'", path);
        Ok(())
    }

    fn restore_ownership(&self, path: &RelPath, uid: u32, gid: u32) {
        let owner = self
            .platform
            .user_name(uid)
            .unwrap_or_else(|| uid.to_string());
        let group = self
            .platform
            .group_name(gid)
            .unwrap_or_else(|| gid.to_string());
        let _ = self
            .platform
            .chown(&self.abs(path), Some(&owner), Some(&group));
    }

    /// Synchronize a set of member files to one guard value, pushing a line
    /// per member. Members already at the target value get their line
    /// without any platform traffic; missing members are surfaced with a
    /// cleanup hint. A platform failure stops the remaining members.
    pub(crate) fn sync_members(
        &mut self,
        members: &[RelPath],
        on: bool,
        report: &mut GuardReport,
    ) {
        for member in members {
            let entry = match self.registry.file(member) {
                Some(entry) => entry,
                None => continue,
            };
            if !self.abs(member).is_file() {
                report.warnings.push(format!(
                    "'{}' not found on disk, run 'guard cleanup'",
                    member
                ));
                continue;
            }
            if entry.guard != on {
                let result = if on {
                    self.enable_one(member)
                } else {
                    self.disable_one(member)
                };
                if let Err(error) = result {
                    report.failures.push(Failure {
                        subject: member.to_string(),
                        error,
                    });
                    break;
                }
            }
            report.lines.push(if on {
                ReportLine::FileEnabled(member.clone())
            } else {
                ReportLine::FileDisabled(member.clone())
            });
        }
    }
}

pub(crate) fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
