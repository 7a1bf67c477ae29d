// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extruded area solids

use stepview_core::{EntityKind, ResolvedEntity, ResolvedGraph};

use crate::error::{Error, Result};
use crate::extrusion::extrude_profile;
use crate::mesh::MeshBuilder;
use crate::placement::{axis2_placement_3d, direction, required};
use crate::profile::read_profile;
use crate::router::GeometryProcessor;

/// Handles IfcExtrudedAreaSolid
pub struct ExtrudedAreaSolidProcessor;

impl GeometryProcessor for ExtrudedAreaSolidProcessor {
    fn process(&self, item: &ResolvedEntity, graph: &ResolvedGraph) -> Result<MeshBuilder> {
        // IfcExtrudedAreaSolid attributes:
        // 0: SweptArea (IfcProfileDef)
        // 1: Position (IfcAxis2Placement3D, optional)
        // 2: ExtrudedDirection (IfcDirection)
        // 3: Depth
        let profile = read_profile(graph, required(graph, item, 0)?)?;
        let position = graph
            .follow(item, 1)
            .map(|p| axis2_placement_3d(graph, p))
            .transpose()?;
        let dir = graph.follow(item, 2).map(direction).transpose()?;
        let depth = item.get_f64(3).ok_or(Error::MissingAttribute {
            entity: item.id,
            index: 3,
        })?;

        extrude_profile(&profile, depth, dir, position.as_ref())
    }

    fn supported_kinds(&self) -> Vec<EntityKind> {
        vec![EntityKind::ExtrudedAreaSolid]
    }
}
