// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # StepView Core
//!
//! STEP (ISO-10303-21) reader for IFC building models, built with
//! [nom](https://docs.rs/nom).
//!
//! ## Overview
//!
//! - **Statement scanning**: quote- and comment-aware splitting of the
//!   `HEADER;` and `DATA;` sections using [memchr](https://docs.rs/memchr)
//! - **Tokenization**: nom combinators turning each `#N=TYPE(...);` into an
//!   [`Entity`] with typed [`Value`] parameters
//! - **Resolution**: [`ResolvedGraph`] links references to handles, detects
//!   dangling references and reference cycles
//! - **Queries**: [`EntityQuery`] filters by kind, name, GlobalId and
//!   spatial container
//! - **Partial failure**: malformed statements become [`Diagnostics`]; only a
//!   file without a DATA section fails
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepview_core::{EntityGraph, ResolvedGraph};
//!
//! let graph = EntityGraph::parse(content)?;
//! let resolved = ResolvedGraph::resolve(graph);
//! for handle in resolved.candidates() {
//!     println!("#{} {}", resolved.get(handle).id, resolved.get(handle).kind);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialize support for kinds, headers and diagnostics

pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod header;
pub mod parser;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod spatial;
pub mod units;
pub mod value;

pub use diagnostics::{
    Diagnostic, DiagnosticKind, Diagnostics, DiagnosticsSummary, DEFAULT_MESSAGE_LIMIT,
};
pub use error::{Error, Result};
pub use graph::{Entity, EntityGraph};
pub use header::FileHeader;
pub use parser::{parse_entity, parse_record, Statement, StatementScanner};
pub use query::{elements_in_storey, EntityQuery};
pub use resolver::{
    EntityHandle, EntityStatus, ResolvedEntity, ResolvedGraph, ResolvedValue, StatusCounts,
};
pub use schema::EntityKind;
pub use spatial::{SpatialNode, SpatialTree};
pub use units::{length_unit_scale, si_prefix_multiplier};
pub use value::Value;
