/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use crate::errors::{GuardError, Result};
use crate::registry::entry::Collection;
use crate::resolver::ensure_name_allowed;

use super::{Engine, Failure, GuardReport, ReportLine};

#[derive(Debug, Default)]
pub struct CreateReport {
    pub created: Vec<String>,
    pub duplicates: Vec<String>,
}

#[derive(Debug, Default)]
pub struct UpdateReport {
    pub added: usize,
    pub already: usize,
    pub removed: usize,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Default)]
pub struct ClearReport {
    /// `(name, members removed)` per cleared collection.
    pub cleared: Vec<(String, usize)>,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
}

#[derive(Debug, Default)]
pub struct DestroyReport {
    /// `(name, member count at destruction)` per destroyed collection.
    pub destroyed: Vec<(String, usize)>,
    pub warnings: Vec<String>,
    pub failures: Vec<Failure>,
}

impl Engine<'_> {
    /// Create empty collections. A reserved name rejects the whole call
    /// before anything is modified; a duplicate is only a warning.
    pub fn create(&mut self, names: &[String]) -> Result<CreateReport> {
        for name in names {
            ensure_name_allowed(name)?;
        }
        let mut report = CreateReport::default();
        for name in names {
            if self.registry.collection(name).is_some() {
                report.duplicates.push(name.clone());
                continue;
            }
            self.registry.add_collection(Collection::new(name.clone()));
            report.created.push(name.clone());
        }
        self.save()?;
        Ok(report)
    }

    /// Register paths and add them to a collection, creating the collection
    /// on first use. With the collection guard active, newly added files
    /// are guarded in the same transaction.
    pub fn update_add(&mut self, name: &str, inputs: &[String]) -> Result<UpdateReport> {
        if self.registry.collection(name).is_none() {
            ensure_name_allowed(name)?;
            self.registry
                .add_collection(Collection::new(name.to_owned()));
        }
        let mut report = UpdateReport::default();
        let mut fresh = Vec::new();
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
            if let Err(error) = self.capture_and_register(&path) {
                report.failures.push(Failure {
                    subject: input.clone(),
                    error,
                });
                continue;
            }
            let collection = self
                .registry
                .collection_mut(name)
                .expect("collection vanished mid-update");
            if collection.contains(&path) {
                report.already += 1;
            } else {
                collection.members.push(path.clone());
                report.added += 1;
                fresh.push(path);
            }
        }

        if self.registry.collection(name).map(|c| c.guard) == Some(true) {
            let mut sync = GuardReport::default();
            self.sync_members(&fresh, true, &mut sync);
            report.warnings.extend(sync.warnings);
            report.failures.extend(sync.failures);
        }
        self.save()?;
        Ok(report)
    }

    /// Remove paths from a collection's membership. With the collection
    /// guard active, files left unprotected by every remaining collection
    /// and folder are disabled.
    pub fn update_remove(&mut self, name: &str, inputs: &[String]) -> Result<UpdateReport> {
        if self.registry.collection(name).is_none() {
            return Err(GuardError::NotFound(format!("collection '{}'", name)));
        }
        let mut report = UpdateReport::default();
        let mut dropped = Vec::new();
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
            let collection = self
                .registry
                .collection_mut(name)
                .expect("collection vanished mid-update");
            if collection.contains(&path) {
                collection.members.retain(|member| member != &path);
                report.removed += 1;
                dropped.push(path);
            } else {
                report
                    .warnings
                    .push(format!("'{}' is not in collection '{}'", path, name));
            }
        }

        if self.registry.collection(name).map(|c| c.guard) == Some(true) {
            for path in &dropped {
                let still_guarded = self.registry.file(path).map(|e| e.guard) == Some(true);
                if still_guarded && !self.registry.guarded_by_other(path, None) {
                    if let Err(error) = self.disable_one(path) {
                        report.failures.push(Failure {
                            subject: path.to_string(),
                            error,
                        });
                        break;
                    }
                }
            }
        }
        self.save()?;
        Ok(report)
    }

    /// Enable or disable a collection: the collection flag is set first and
    /// every member is synchronized to that value, whatever its previous
    /// individual state. File lines precede the collection summary line.
    pub fn set_collection_guard(&mut self, name: &str, on: bool) -> Result<GuardReport> {
        let report = self.sync_collection_guard(name, on);
        self.save()?;
        Ok(report)
    }

    /// The synchronization itself, without persisting; `toggle` composes
    /// several of these into one save.
    pub(crate) fn sync_collection_guard(&mut self, name: &str, on: bool) -> GuardReport {
        let mut report = GuardReport::default();
        let members = match self.registry.collection(name) {
            Some(collection) => collection.members.clone(),
            None => {
                report.failures.push(Failure {
                    subject: name.to_owned(),
                    error: GuardError::NotFound(format!("collection '{}'", name)),
                });
                return report;
            }
        };
        self.registry
            .collection_mut(name)
            .expect("collection vanished mid-sync")
            .guard = on;
        self.sync_members(&members, on, &mut report);
        report.lines.push(if on {
            ReportLine::CollectionEnabled(name.to_owned())
        } else {
            ReportLine::CollectionDisabled(name.to_owned())
        });
        report
    }

    /// Disable each collection's guard and empty its membership; the
    /// collection itself and its file entries stay.
    pub fn clear(&mut self, names: &[String]) -> Result<ClearReport> {
        let mut report = ClearReport::default();
        for name in names {
            if self.registry.collection(name).is_none() {
                report.failures.push(Failure {
                    subject: name.clone(),
                    error: GuardError::NotFound(format!("collection '{}'", name)),
                });
                continue;
            }
            let sync = self.sync_collection_guard(name, false);
            report.warnings.extend(sync.warnings);
            let failed = !sync.failures.is_empty();
            report.failures.extend(sync.failures);
            if failed {
                break;
            }
            let collection = self
                .registry
                .collection_mut(name)
                .expect("collection vanished mid-clear");
            let count = collection.members.len();
            collection.members.clear();
            report.cleared.push((name.clone(), count));
        }
        self.save()?;
        Ok(report)
    }

    /// Disable each collection's guard and drop the collection; file
    /// entries always survive destruction.
    pub fn destroy(&mut self, names: &[String]) -> Result<DestroyReport> {
        let mut report = DestroyReport::default();
        for name in names {
            if self.registry.collection(name).is_none() {
                report.failures.push(Failure {
                    subject: name.clone(),
                    error: GuardError::NotFound(format!("collection '{}'", name)),
                });
                continue;
            }
            let sync = self.sync_collection_guard(name, false);
            report.warnings.extend(sync.warnings);
            let failed = !sync.failures.is_empty();
            report.failures.extend(sync.failures);
            if failed {
                break;
            }
            let count = self
                .registry
                .collection(name)
                .map(|c| c.members.len())
                .unwrap_or(0);
            self.registry.drop_collection(name);
            report.destroyed.push((name.clone(), count));
        }
        self.save()?;
        Ok(report)
    }
}
