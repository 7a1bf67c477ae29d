// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use stepview_core::EntityKind;
use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug)]
pub enum Error {
    #[error("Triangulation failed: {0}")]
    TriangulationError(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid extrusion parameters: {0}")]
    InvalidExtrusion(String),

    #[error("Empty mesh: {0}")]
    EmptyMesh(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("#{entity}: missing attribute {index}")]
    MissingAttribute { entity: u64, index: usize },

    #[error("#{entity}: expected {expected}, found {found}")]
    UnexpectedKind {
        entity: u64,
        expected: &'static str,
        found: EntityKind,
    },

    #[error("No processor for {0}")]
    Unsupported(EntityKind),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Core parser error: {0}")]
    CoreError(#[from] stepview_core::Error),
}

impl Error {
    pub fn geometry(message: impl Into<String>) -> Self {
        Error::Geometry(message.into())
    }
}
