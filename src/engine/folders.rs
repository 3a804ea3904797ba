/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use log::debug;

use crate::errors::Result;
use crate::registry::pathname::RelPath;

use super::{Engine, Failure, GuardReport, ReportLine};

impl Engine<'_> {
    /// Materialize a folder-collection from the directory's direct-child
    /// regular files (never recursive), registering each child and creating
    /// the folder entry on first use. Returns the current membership.
    pub(crate) fn materialize_folder(&mut self, path: &RelPath) -> (Vec<RelPath>, Vec<Failure>) {
        let mut members = Vec::new();
        let mut failures = Vec::new();
        for child in self.registry.disk_children(path) {
            match self.capture_and_register(&child) {
                Ok(_) => members.push(child),
                Err(error) => failures.push(Failure {
                    subject: child.to_string(),
                    error,
                }),
            }
        }
        self.registry.ensure_folder(path);
        debug!("folder '@{}' materialized with {} file(s)", path, members.len());
        (members, failures)
    }

    /// Enable or disable a folder-collection: membership is materialized at
    /// operation time, then synchronized exactly like a collection.
    pub fn set_folder_guard(&mut self, path: &RelPath, on: bool) -> Result<GuardReport> {
        let report = self.sync_folder_guard(path, on);
        self.save()?;
        Ok(report)
    }

    pub(crate) fn sync_folder_guard(&mut self, path: &RelPath, on: bool) -> GuardReport {
        let mut report = GuardReport::default();
        let (members, failures) = self.materialize_folder(path);
        report.failures.extend(failures);
        if members.is_empty() {
            report
                .warnings
                .push(format!("folder '{}' contains no files", path));
        }
        self.registry
            .folder_by_path_mut(path)
            .expect("folder vanished mid-sync")
            .guard = on;
        self.sync_members(&members, on, &mut report);
        report.lines.push(if on {
            ReportLine::FolderEnabled(path.clone())
        } else {
            ReportLine::FolderDisabled(path.clone())
        });
        report
    }
}
