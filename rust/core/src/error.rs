// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for parsing and resolution
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while reading a STEP physical file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The input carries neither the ISO-10303-21 signature nor a DATA section.
    #[error("input is not an ISO-10303-21 file")]
    NotStep,

    /// The file has a signature but no `DATA;` section to read entities from.
    #[error("no DATA section found")]
    MissingDataSection,

    #[error("parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("duplicate entity #{0}")]
    DuplicateEntity(u64),

    #[error("#{owner} references missing entity #{target}")]
    UnresolvedReference { owner: u64, target: u64 },

    #[error("reference cycle through #{0}")]
    CyclicReference(u64),

    #[error("entity #{0} not found")]
    EntityNotFound(u64),
}

impl Error {
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }

    /// Whether this error aborts a whole load rather than a single entity.
    pub fn is_catastrophic(&self) -> bool {
        matches!(self, Error::NotStep | Error::MissingDataSection)
    }
}
