// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Length unit extraction
//!
//! Follows IFCPROJECT → IFCUNITASSIGNMENT → length unit and returns the
//! factor that converts model coordinates to metres.

use crate::resolver::{ResolvedEntity, ResolvedGraph};
use crate::schema::EntityKind;

/// SI Prefix multipliers as defined in IFC specification
/// Maps IfcSIPrefix enum values to their numeric multipliers
#[inline]
pub fn si_prefix_multiplier(prefix: &str) -> f64 {
    match prefix {
        "ATTO" => 1e-18,
        "FEMTO" => 1e-15,
        "PICO" => 1e-12,
        "NANO" => 1e-9,
        "MICRO" => 1e-6,
        "MILLI" => 1e-3,
        "CENTI" => 1e-2,
        "DECI" => 1e-1,
        "DECA" => 1e1,
        "HECTO" => 1e2,
        "KILO" => 1e3,
        "MEGA" => 1e6,
        "GIGA" => 1e9,
        "TERA" => 1e12,
        "PETA" => 1e15,
        "EXA" => 1e18,
        _ => 1.0,
    }
}

/// Scale factor from model length units to metres (1.0 when undeclared)
pub fn length_unit_scale(graph: &ResolvedGraph) -> f64 {
    let Some(project) = graph.first_of_kind(&EntityKind::Project) else {
        return 1.0;
    };

    // IFCPROJECT attribute 8: UnitsInContext
    let Some(assignment) = graph.follow(graph.get(project), 8) else {
        return 1.0;
    };
    if assignment.kind != EntityKind::UnitAssignment {
        return 1.0;
    }

    let Some(units) = assignment.get(0).and_then(|v| v.as_list()) else {
        return 1.0;
    };

    units
        .iter()
        .filter_map(|unit| unit.as_handle().map(|h| graph.get(h)))
        .find_map(|unit| length_unit_factor(graph, unit, 0))
        .unwrap_or(1.0)
}

/// Factor of a unit entity if it is a length unit
fn length_unit_factor(graph: &ResolvedGraph, unit: &ResolvedEntity, depth: usize) -> Option<f64> {
    // Conversion-based units can chain; bound the walk
    if depth > 4 {
        return None;
    }
    match unit.kind {
        // IFCSIUNIT: Dimensions, UnitType, Prefix, Name
        EntityKind::SiUnit => {
            if unit.get(1)?.as_enum()? != "LENGTHUNIT" {
                return None;
            }
            Some(
                unit.get(2)
                    .and_then(|p| p.as_enum())
                    .map_or(1.0, si_prefix_multiplier),
            )
        }
        // IFCCONVERSIONBASEDUNIT: Dimensions, UnitType, Name, ConversionFactor
        EntityKind::ConversionBasedUnit => {
            if unit.get(1)?.as_enum()? != "LENGTHUNIT" {
                return None;
            }
            // IFCMEASUREWITHUNIT: ValueComponent, UnitComponent
            let measure = graph.follow(unit, 3)?;
            let value = measure.get(0)?.as_f64()?;
            let base = graph
                .follow(measure, 1)
                .and_then(|u| length_unit_factor(graph, u, depth + 1))
                .unwrap_or(1.0);
            Some(value * base)
        }
        _ => None,
    }
}
