// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recoverable problems collected during a load
//!
//! Every recoverable condition is counted; only the first `limit` messages
//! are kept so a badly broken file cannot flood memory.

use std::fmt;

/// Default number of messages retained
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

const KIND_COUNT: usize = 6;

/// Category of a recoverable problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum DiagnosticKind {
    /// Malformed or unterminated statement
    EntityParse,
    /// Second definition of an id already in the graph
    DuplicateEntity,
    /// `#id` pointing at nothing
    UnresolvedReference,
    /// Entity chain that loops back on itself
    CyclicReference,
    /// Supported entity whose geometry could not be built
    ExtractionFailed,
    /// Problem in the HEADER section
    Header,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; KIND_COUNT] = [
        DiagnosticKind::EntityParse,
        DiagnosticKind::DuplicateEntity,
        DiagnosticKind::UnresolvedReference,
        DiagnosticKind::CyclicReference,
        DiagnosticKind::ExtractionFailed,
        DiagnosticKind::Header,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::EntityParse => "entity_parse",
            DiagnosticKind::DuplicateEntity => "duplicate_entity",
            DiagnosticKind::UnresolvedReference => "unresolved_reference",
            DiagnosticKind::CyclicReference => "cyclic_reference",
            DiagnosticKind::ExtractionFailed => "extraction_failed",
            DiagnosticKind::Header => "header",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded problem
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Owning entity, when the problem belongs to one
    pub entity: Option<u64>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity {
            Some(id) => write!(f, "[{}] #{}: {}", self.kind, id, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Counted, capped list of diagnostics
#[derive(Debug, Clone)]
pub struct Diagnostics {
    counts: [usize; KIND_COUNT],
    entries: Vec<Diagnostic>,
    limit: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MESSAGE_LIMIT)
    }
}

impl Diagnostics {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            counts: [0; KIND_COUNT],
            entries: Vec::new(),
            limit,
        }
    }

    pub fn push(&mut self, kind: DiagnosticKind, entity: Option<u64>, message: impl Into<String>) {
        self.counts[kind.index()] += 1;
        if self.entries.len() < self.limit {
            self.entries.push(Diagnostic {
                kind,
                entity,
                message: message.into(),
            });
        }
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.counts[kind.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Retained messages, oldest first
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Fold another collection into this one, keeping this one's limit
    pub fn merge(&mut self, other: Diagnostics) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts) {
            *mine += theirs;
        }
        let room = self.limit.saturating_sub(self.entries.len());
        self.entries.extend(other.entries.into_iter().take(room));
    }

    pub fn summary(&self) -> DiagnosticsSummary {
        DiagnosticsSummary {
            total: self.total(),
            counts: DiagnosticKind::ALL
                .iter()
                .filter(|kind| self.count(**kind) > 0)
                .map(|kind| (kind.as_str().to_string(), self.count(*kind)))
                .collect(),
            messages: self.entries.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Counts plus the first N messages, for display and export
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DiagnosticsSummary {
    pub total: usize,
    pub counts: Vec<(String, usize)>,
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_exceed_retained_messages() {
        let mut diagnostics = Diagnostics::with_limit(2);
        for id in 0..5 {
            diagnostics.push(DiagnosticKind::EntityParse, Some(id), "bad");
        }
        assert_eq!(diagnostics.count(DiagnosticKind::EntityParse), 5);
        assert_eq!(diagnostics.entries().len(), 2);
    }

    #[test]
    fn test_merge_and_summary() {
        let mut a = Diagnostics::default();
        a.push(DiagnosticKind::EntityParse, Some(1), "unterminated");
        let mut b = Diagnostics::default();
        b.push(DiagnosticKind::UnresolvedReference, Some(2), "#9 missing");
        a.merge(b);

        let summary = a.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(
            summary.counts,
            vec![
                ("entity_parse".to_string(), 1),
                ("unresolved_reference".to_string(), 1)
            ]
        );
        assert_eq!(summary.messages[1], "[unresolved_reference] #2: #9 missing");
    }
}
