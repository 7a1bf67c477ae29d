// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for loading and viewing models.

/// Result type alias for viewer operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the viewer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file is not STEP or has no DATA section.
    #[error("load failed: {0}")]
    Parse(#[from] stepview_core::Error),

    #[error("geometry extraction failed: {0}")]
    Geometry(stepview_geometry::Error),

    /// A newer load replaced this one.
    #[error("load cancelled")]
    Cancelled,

    /// The background task ended without reporting.
    #[error("background load ended without a result")]
    LoaderDisconnected,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<stepview_geometry::Error> for Error {
    fn from(err: stepview_geometry::Error) -> Self {
        match err {
            stepview_geometry::Error::Cancelled => Error::Cancelled,
            stepview_geometry::Error::CoreError(core) => Error::Parse(core),
            other => Error::Geometry(other),
        }
    }
}

impl Error {
    /// Whether the failure should put the viewer into its failed state.
    /// A cancelled or abandoned load says nothing about the file.
    pub fn is_load_failure(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::LoaderDisconnected)
    }
}
