/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuardError>;

/// Every user-visible failure of an operation. The `Display` phrasings are
/// part of the CLI contract and must stay stable.
#[derive(Error, Debug)]
pub enum GuardError {
    /// Target name or path does not resolve to anything known.
    #[error("{0} not found")]
    NotFound(String),
    /// A structural keyword was used as a collection or folder name.
    #[error("'{0}' is a reserved keyword and cannot be used as a name")]
    Reserved(String),
    /// Malformed mode, unknown user or group, bad argument.
    #[error("{0}")]
    Invalid(String),
    /// The platform refused a mutation, typically for lack of privilege.
    #[error("{0}: permission denied, re-run with elevated privilege")]
    Denied(String),
    /// The filesystem cannot honor the immutable flag.
    #[error("{0}: filesystem does not support the immutable flag")]
    Unsupported(String),
    /// The state file failed to load.
    #[error("malformed state file: {0}")]
    Malformed(String),
    /// A file on disk and a collection share a name; the file wins.
    #[error("'{0}' names both a file on disk and a collection, using the file")]
    Conflict(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_contains_mandated_substring() {
        let err = GuardError::NotFound("mycoll".to_owned());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn denied_hints_at_privilege() {
        let err = GuardError::Denied("a.txt".to_owned());
        assert!(err.to_string().contains("elevated privilege"));
    }
}
