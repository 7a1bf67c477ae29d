// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity graph builder
//!
//! Walks the file statement by statement: the ISO-10303-21 signature, the
//! `HEADER;` records and every `#N=TYPE(...);` instance of the `DATA;`
//! section. A malformed instance is recorded as a diagnostic and skipped;
//! only a file without a DATA section fails as a whole.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{Error, Result};
use crate::header::FileHeader;
use crate::parser::{parse_entity, parse_record, StatementScanner};
use crate::schema::EntityKind;
use crate::value::Value;

/// A parsed entity instance
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// File-local id (`#N`)
    pub id: u64,
    pub kind: EntityKind,
    pub params: Vec<Value>,
}

impl Entity {
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }

    /// Entity reference at `index`
    #[inline]
    pub fn get_ref(&self, index: usize) -> Option<u64> {
        self.get(index).and_then(Value::as_entity_ref)
    }

    /// Numeric value at `index`
    #[inline]
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Header,
    Data,
}

/// Map from entity id to parsed entity, in file order
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    header: FileHeader,
    entities: Vec<Entity>,
    index: FxHashMap<u64, usize>,
    diagnostics: Diagnostics,
}

impl EntityGraph {
    /// Parse raw bytes. STEP files are ASCII; anything else is decoded lossily.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match String::from_utf8_lossy(bytes) {
            Cow::Borrowed(text) => Self::parse(text),
            Cow::Owned(text) => {
                tracing::warn!("input is not valid UTF-8; invalid bytes were replaced");
                Self::parse(&text)
            }
        }
    }

    /// Parse a complete STEP physical file
    pub fn parse(content: &str) -> Result<Self> {
        Self::parse_with_limit(content, crate::diagnostics::DEFAULT_MESSAGE_LIMIT)
    }

    /// Parse, retaining at most `message_limit` diagnostic messages
    pub fn parse_with_limit(content: &str, message_limit: usize) -> Result<Self> {
        let mut graph = EntityGraph {
            diagnostics: Diagnostics::with_limit(message_limit),
            ..Default::default()
        };

        let mut has_signature = false;
        let mut saw_data = false;
        let mut section = Section::None;

        for statement in StatementScanner::new(content) {
            if let Some(keyword) = statement.keyword() {
                match keyword {
                    "ISO-10303-21" => has_signature = true,
                    "HEADER" => section = Section::Header,
                    "DATA" => {
                        section = Section::Data;
                        saw_data = true;
                    }
                    "ENDSEC" => section = Section::None,
                    "END-ISO-10303-21" => break,
                    other => graph.diagnostics.push(
                        DiagnosticKind::EntityParse,
                        None,
                        format!("unexpected keyword `{}` at byte {}", other, statement.offset),
                    ),
                }
                continue;
            }

            // Parameterised DATA sections: DATA(('name'),('IFC4'));
            if section == Section::None && statement.text.trim_start().starts_with("DATA") {
                section = Section::Data;
                saw_data = true;
                continue;
            }

            match section {
                Section::Header => graph.header_statement(statement.text, statement.offset),
                Section::Data => {
                    if !statement.terminated {
                        let id = leading_id(statement.text);
                        graph.diagnostics.push(
                            DiagnosticKind::EntityParse,
                            id,
                            format!("unterminated statement at byte {}", statement.offset),
                        );
                        continue;
                    }
                    graph.data_statement(statement.text, statement.offset);
                }
                Section::None => graph.diagnostics.push(
                    DiagnosticKind::EntityParse,
                    leading_id(statement.text),
                    format!("statement outside any section at byte {}", statement.offset),
                ),
            }
        }

        if !saw_data {
            return Err(if has_signature {
                Error::MissingDataSection
            } else {
                Error::NotStep
            });
        }
        if !has_signature {
            tracing::warn!("missing ISO-10303-21 signature; reading DATA section anyway");
        }

        tracing::debug!(
            entities = graph.entities.len(),
            diagnostics = graph.diagnostics.total(),
            schema = graph.header.schema().unwrap_or("unknown"),
            "entity graph built"
        );
        Ok(graph)
    }

    fn header_statement(&mut self, text: &str, offset: usize) {
        match parse_record(text, offset) {
            Ok((name, params)) => self.header.apply(&name, &params),
            Err(e) => self
                .diagnostics
                .push(DiagnosticKind::Header, None, e.to_string()),
        }
    }

    fn data_statement(&mut self, text: &str, offset: usize) {
        match parse_entity(text, offset) {
            Ok((id, type_name, params)) => {
                if self.index.contains_key(&id) {
                    self.diagnostics.push(
                        DiagnosticKind::DuplicateEntity,
                        Some(id),
                        Error::DuplicateEntity(id).to_string(),
                    );
                    return;
                }
                self.index.insert(id, self.entities.len());
                self.entities.push(Entity {
                    id,
                    kind: EntityKind::from_name(&type_name),
                    params,
                });
            }
            Err(e) => {
                self.diagnostics
                    .push(DiagnosticKind::EntityParse, leading_id(text), e.to_string());
            }
        }
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn get(&self, id: u64) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    pub fn contains(&self, id: u64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in file order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Ids of every entity of a kind, in file order
    pub fn ids_of_kind<'a>(&'a self, kind: &'a EntityKind) -> impl Iterator<Item = u64> + 'a {
        self.entities
            .iter()
            .filter(move |e| &e.kind == kind)
            .map(|e| e.id)
    }

    /// Count entities by type name
    pub fn count_by_kind(&self) -> FxHashMap<String, usize> {
        let mut counts = FxHashMap::default();
        for entity in &self.entities {
            *counts.entry(entity.kind.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Split into parts for resolution
    pub(crate) fn into_parts(self) -> (FileHeader, Vec<Entity>, FxHashMap<u64, usize>, Diagnostics) {
        (self.header, self.entities, self.index, self.diagnostics)
    }
}

/// Best-effort `#N` of a statement that failed to parse
fn leading_id(text: &str) -> Option<u64> {
    let rest = text.trim_start().strip_prefix('#')?;
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &str) -> String {
        format!(
            "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nFILE_NAME('t.ifc','',(''),(''),'','','');\nFILE_SCHEMA(('IFC4'));\nENDSEC;\nDATA;\n{}\nENDSEC;\nEND-ISO-10303-21;\n",
            data
        )
    }

    #[test]
    fn test_parse_entities_and_header() {
        let content = wrap("#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCPOLYLINE((#1,#1));");
        let graph = EntityGraph::parse(&content).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.header().schema(), Some("IFC4"));
        assert_eq!(graph.get(2).unwrap().kind, EntityKind::Polyline);
        assert!(graph.diagnostics().is_empty());
    }

    #[test]
    fn test_malformed_statement_is_skipped() {
        let content = wrap(
            "#1=IFCCARTESIANPOINT((0.,0.,0.));\n#2=IFCCARTESIANPOINT((1.0.0,0.));\n#3=IFCWALL('x',$\n#4=IFCDIRECTION((1.,0.,0.));",
        );
        let graph = EntityGraph::parse(&content).unwrap();
        assert_eq!(graph.len(), 2);
        assert!(graph.contains(1));
        assert!(graph.contains(4));
        assert_eq!(graph.diagnostics().count(DiagnosticKind::EntityParse), 2);
        let ids: Vec<_> = graph.diagnostics().entries().iter().map(|d| d.entity).collect();
        assert_eq!(ids, vec![Some(2), Some(3)]);
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let content = wrap("#1=IFCDIRECTION((1.,0.,0.));\n#1=IFCDIRECTION((0.,1.,0.));");
        let graph = EntityGraph::parse(&content).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.diagnostics().count(DiagnosticKind::DuplicateEntity), 1);
    }

    #[test]
    fn test_missing_data_section_is_catastrophic() {
        let err = EntityGraph::parse("ISO-10303-21;\nHEADER;\nENDSEC;\nEND-ISO-10303-21;").unwrap_err();
        assert_eq!(err, Error::MissingDataSection);
        assert!(err.is_catastrophic());

        let err = EntityGraph::parse("solid cube\nendsolid").unwrap_err();
        assert_eq!(err, Error::NotStep);
    }

    #[test]
    fn test_data_without_signature_still_loads() {
        let graph = EntityGraph::parse("DATA;\n#1=IFCDIRECTION((1.,0.,0.));\nENDSEC;").unwrap();
        assert_eq!(graph.len(), 1);
    }
}
