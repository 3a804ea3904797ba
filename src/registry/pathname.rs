/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::fmt::Display;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("path '{0}' escapes the workspace")]
    Escapes(String),
    #[error("path '{0}' traverses a symlink")]
    SymlinkSegment(String),
    #[error("path '{0}' does not name a workspace file")]
    NotAFilePath(String),
}

/// A workspace-relative path, stored canonical: `/`-separated, no `.` or
/// `..` segments, never absolute, never empty.
#[derive(Debug, Clone, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct RelPath(String);

impl Display for RelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for RelPath {
    type Error = PathError;

    /// Lexical-only construction, for callers with no workspace at hand.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        normalize(Path::new("/"), value)
    }
}

impl RelPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Parent path, `None` for a top-level entry.
    pub fn parent(&self) -> Option<RelPath> {
        self.0.rfind('/').map(|at| RelPath(self.0[..at].to_owned()))
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Absolute location of this entry under `workspace`.
    pub fn to_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.0)
    }

    pub fn is_direct_child_of(&self, dir: &RelPath) -> bool {
        self.parent().as_ref() == Some(dir)
    }

    /// Append one plain segment. The segment must not contain separators.
    pub fn join(&self, name: &str) -> RelPath {
        RelPath(format!("{}/{}", self.0, name))
    }
}

/// Lexically normalize `input` relative to `workspace`: resolve `.` and
/// `..`, strip the workspace prefix from absolute paths, and reject
/// anything that climbs above the workspace.
pub fn normalize(workspace: &Path, input: &str) -> Result<RelPath, PathError> {
    let raw = Path::new(input);
    let relative: PathBuf = if raw.is_absolute() {
        raw.strip_prefix(workspace)
            .map_err(|_| PathError::Escapes(input.to_owned()))?
            .to_path_buf()
    } else {
        raw.to_path_buf()
    };

    let mut segments: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                segments.push(segment.to_string_lossy().into_owned());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if segments.pop().is_none() {
                    return Err(PathError::Escapes(input.to_owned()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::Escapes(input.to_owned()));
            }
        }
    }
    if segments.is_empty() {
        return Err(PathError::NotAFilePath(input.to_owned()));
    }
    Ok(RelPath(segments.join("/")))
}

/// Full canonicalization: lexical normalization plus a symlink check on
/// every segment that exists on disk. Invariant: a stored path never
/// traverses a symlink.
pub fn canonicalize(workspace: &Path, input: &str) -> Result<RelPath, PathError> {
    let rel = normalize(workspace, input)?;
    let mut prefix = workspace.to_path_buf();
    for segment in rel.segments() {
        prefix.push(segment);
        match fs::symlink_metadata(&prefix) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(PathError::SymlinkSegment(input.to_owned()));
            }
            _ => {}
        }
    }
    Ok(rel)
}
