/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::errors::{GuardError, Result};
use crate::registry::pathname::{self, RelPath};
use crate::resolver::Target;

use super::{Engine, Failure, GuardReport, ReportLine};

#[derive(Debug, Default)]
pub struct AddReport {
    pub registered: usize,
    pub already: usize,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Default)]
pub struct RemoveReport {
    pub removed: usize,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
}

impl Engine<'_> {
    /// Register paths, capturing original attributes once (re-adding a path
    /// is a no-op). Each path is independent; a bad one does not stop the
    /// rest.
    pub fn add(&mut self, inputs: &[String]) -> Result<AddReport> {
        let mut report = AddReport::default();
        for input in inputs {
            let path = match self.canonical(input) {
                Ok(path) => path,
                Err(error) => {
                    report.failures.push(Failure {
                        subject: input.clone(),
                        error,
                    });
                    continue;
                }
            };
            match self.capture_and_register(&path) {
                Ok(true) => report.registered += 1,
                Ok(false) => report.already += 1,
                Err(error) => report.failures.push(Failure {
                    subject: input.clone(),
                    error,
                }),
            }
        }
        self.save()?;
        Ok(report)
    }

    /// Unregister paths. A guarded file is disabled first; failing to
    /// restore its permissions aborts the rest of the remove.
    pub fn remove(&mut self, inputs: &[String]) -> Result<RemoveReport> {
        let mut report = RemoveReport::default();
        for input in inputs {
            let path = match self.canonical(input) {
                Ok(path) => path,
                Err(error) => {
                    report.failures.push(Failure {
                        subject: input.clone(),
                        error,
                    });
                    continue;
                }
            };
            let entry = match self.registry.file(&path) {
                Some(entry) => entry,
                None => {
                    report
                        .warnings
                        .push(format!("'{}' is not registered, skipping", path));
                    continue;
                }
            };
            if entry.guard {
                if self.abs(&path).is_file() {
                    if let Err(error) = self.disable_one(&path) {
                        report.failures.push(Failure {
                            subject: path.to_string(),
                            error,
                        });
                        break;
                    }
                } else {
                    // Nothing left on disk to restore; drop the entry.
                    report
                        .warnings
                        .push(format!("'{}' not found on disk, dropping entry", path));
                }
            }
            self.registry.drop_file(&path);
            report.removed += 1;
        }
        self.save()?;
        Ok(report)
    }

    /// Enable the guard on file targets. Already-guarded files are skipped
    /// with a warning; a platform failure stops the remaining targets.
    pub fn enable_files(&mut self, paths: &[RelPath]) -> Result<GuardReport> {
        let targets: Vec<Target> = paths.iter().cloned().map(Target::File).collect();
        self.set_guard(&targets, true)
    }

    /// Disable the guard on file targets, restoring original attributes.
    pub fn disable_files(&mut self, paths: &[RelPath]) -> Result<GuardReport> {
        let targets: Vec<Target> = paths.iter().cloned().map(Target::File).collect();
        self.set_guard(&targets, false)
    }

    /// One file transition inside a larger report. Returns `false` when the
    /// operation must stop (platform failure on this path).
    fn set_one_file(&mut self, path: &RelPath, on: bool, report: &mut GuardReport) -> bool {
        let verb = if on { "enabled" } else { "disabled" };
        match self.registry.file(path) {
            None => {
                report.failures.push(Failure {
                    subject: path.to_string(),
                    error: GuardError::NotFound(format!(
                        "'{}' (not registered, run 'guard add {}')",
                        path, path
                    )),
                });
                return true;
            }
            Some(entry) if entry.guard == on => {
                report
                    .warnings
                    .push(format!("guard already {} for '{}'", verb, path));
                return true;
            }
            Some(_) => {}
        }
        // Same pre-check as the member sync: a registered file that is gone
        // from disk is skipped before any mutation. Every error a
        // transition produces past this point is a platform failure and
        // stops the remaining targets.
        if !self.abs(path).is_file() {
            report.warnings.push(format!(
                "'{}' not found on disk, run 'guard cleanup'",
                path
            ));
            return true;
        }
        let result = if on {
            self.enable_one(path)
        } else {
            self.disable_one(path)
        };
        match result {
            Ok(()) => {
                report.lines.push(if on {
                    ReportLine::FileEnabled(path.clone())
                } else {
                    ReportLine::FileDisabled(path.clone())
                });
                if on {
                    report.standalone_enabled += 1;
                } else {
                    report.standalone_disabled += 1;
                }
                true
            }
            Err(error) => {
                report.failures.push(Failure {
                    subject: path.to_string(),
                    error,
                });
                false
            }
        }
    }

    /// Drive every target to one guard value. Mixed target kinds keep
    /// their argument order; the registry is saved once at the end.
    pub fn set_guard(&mut self, targets: &[Target], on: bool) -> Result<GuardReport> {
        let mut report = GuardReport::default();
        for target in targets {
            match target {
                Target::File(path) => {
                    if !self.set_one_file(path, on, &mut report) {
                        break;
                    }
                }
                Target::Collection(name) => {
                    let inner = self.sync_collection_guard(name, on);
                    let stop = inner.failed();
                    report.merge(inner);
                    if stop {
                        break;
                    }
                }
                Target::Folder(path) => {
                    let inner = self.sync_folder_guard(path, on);
                    let stop = inner.failed();
                    report.merge(inner);
                    if stop {
                        break;
                    }
                }
            }
        }
        self.save()?;
        Ok(report)
    }

    /// Toggle each target to the opposite of its current state. An
    /// untracked file is registered and enabled in the same transaction.
    pub fn toggle(&mut self, targets: &[Target]) -> Result<GuardReport> {
        let mut report = GuardReport::default();
        for target in targets {
            match target {
                Target::File(path) => {
                    if self.registry.file(path).is_none() {
                        if let Err(error) = self.capture_and_register(path) {
                            report.failures.push(Failure {
                                subject: path.to_string(),
                                error,
                            });
                            continue;
                        }
                    }
                    let on = !self.registry.file(path).map(|e| e.guard).unwrap_or(false);
                    if !self.set_one_file(path, on, &mut report) {
                        break;
                    }
                }
                Target::Collection(name) => {
                    let on = !self
                        .registry
                        .collection(name)
                        .map(|c| c.guard)
                        .unwrap_or(false);
                    let inner = self.sync_collection_guard(name, on);
                    let stop = inner.failed();
                    report.merge(inner);
                    if stop {
                        break;
                    }
                }
                Target::Folder(path) => {
                    let on = !self
                        .registry
                        .folder_by_path(path)
                        .map(|f| f.guard)
                        .unwrap_or(false);
                    let inner = self.sync_folder_guard(path, on);
                    let stop = inner.failed();
                    report.merge(inner);
                    if stop {
                        break;
                    }
                }
            }
        }
        self.save()?;
        Ok(report)
    }

    pub(crate) fn canonical(&self, input: &str) -> Result<RelPath> {
        pathname::canonicalize(self.registry.workspace(), input)
            .map_err(|err| GuardError::Invalid(err.to_string()))
    }
}
