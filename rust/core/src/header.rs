// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HEADER section records

use crate::value::Value;

/// Contents of the `HEADER;` section
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileHeader {
    /// FILE_DESCRIPTION.description
    pub description: Vec<String>,
    /// FILE_NAME.name
    pub name: Option<String>,
    /// FILE_NAME.time_stamp
    pub timestamp: Option<String>,
    /// FILE_NAME.originating_system
    pub originating_system: Option<String>,
    /// FILE_SCHEMA identifiers, e.g. `IFC4`
    pub schemas: Vec<String>,
}

impl FileHeader {
    /// Apply one parsed header record. Unknown records are ignored.
    pub fn apply(&mut self, record: &str, params: &[Value]) {
        match record {
            "FILE_DESCRIPTION" => {
                self.description = strings(params.first());
            }
            "FILE_NAME" => {
                self.name = params.first().and_then(Value::as_str).map(str::to_string);
                self.timestamp = params.get(1).and_then(Value::as_str).map(str::to_string);
                self.originating_system =
                    params.get(5).and_then(Value::as_str).map(str::to_string);
            }
            "FILE_SCHEMA" => {
                self.schemas = strings(params.first());
            }
            _ => {}
        }
    }

    /// First schema identifier, if any
    pub fn schema(&self) -> Option<&str> {
        self.schemas.first().map(String::as_str)
    }
}

fn strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
