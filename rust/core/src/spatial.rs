// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial structure tree (project → site → building → storey → space)
//!
//! Built from IfcRelAggregates (decomposition) and
//! IfcRelContainedInSpatialStructure (element containment).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::resolver::{ResolvedEntity, ResolvedGraph, ResolvedValue};
use crate::schema::EntityKind;

/// One spatial container
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpatialNode {
    pub id: u64,
    pub kind: EntityKind,
    pub name: Option<String>,
    /// Decomposing spatial containers
    pub children: Vec<u64>,
    /// Elements contained directly in this container
    pub elements: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct SpatialTree {
    nodes: FxHashMap<u64, SpatialNode>,
    roots: Vec<u64>,
}

impl SpatialTree {
    pub fn build(graph: &ResolvedGraph) -> Self {
        let mut nodes: FxHashMap<u64, SpatialNode> = FxHashMap::default();
        let mut order = Vec::new();
        for (_, entity) in graph.iter() {
            if entity.kind.is_spatial() {
                order.push(entity.id);
                nodes.insert(
                    entity.id,
                    SpatialNode {
                        id: entity.id,
                        kind: entity.kind.clone(),
                        // IfcRoot attribute 2: Name
                        name: entity.get(2).and_then(ResolvedValue::as_str).map(str::to_string),
                        children: Vec::new(),
                        elements: Vec::new(),
                    },
                );
            }
        }

        let mut has_parent = FxHashSet::default();
        for (_, rel) in graph.iter() {
            match rel.kind {
                // IfcRelAggregates: 4 RelatingObject, 5 RelatedObjects
                EntityKind::RelAggregates => {
                    let Some(parent) = graph.follow(rel, 4).map(|e| e.id) else {
                        continue;
                    };
                    for child in related(graph, rel, 5) {
                        if nodes.contains_key(&child.id) && nodes.contains_key(&parent) {
                            has_parent.insert(child.id);
                            if let Some(node) = nodes.get_mut(&parent) {
                                node.children.push(child.id);
                            }
                        } else if let Some(node) = nodes.get_mut(&parent) {
                            // Element aggregated by a container (e.g. a storey's slab)
                            node.elements.push(child.id);
                        }
                    }
                }
                // IfcRelContainedInSpatialStructure: 4 RelatedElements, 5 RelatingStructure
                EntityKind::RelContainedInSpatialStructure => {
                    let Some(parent) = graph.follow(rel, 5).map(|e| e.id) else {
                        continue;
                    };
                    let elements: Vec<u64> = related(graph, rel, 4).map(|e| e.id).collect();
                    if let Some(node) = nodes.get_mut(&parent) {
                        node.elements.extend(elements);
                    }
                }
                _ => {}
            }
        }

        let roots = order
            .into_iter()
            .filter(|id| !has_parent.contains(id))
            .collect();
        SpatialTree { nodes, roots }
    }

    /// Containers without a parent, in file order
    pub fn roots(&self) -> &[u64] {
        &self.roots
    }

    pub fn node(&self, id: u64) -> Option<&SpatialNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every element contained in `id` or any container below it
    pub fn elements_under(&self, id: u64) -> Vec<u64> {
        let mut out = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                out.extend_from_slice(&node.elements);
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }
}

fn related<'a>(
    graph: &'a ResolvedGraph,
    rel: &'a ResolvedEntity,
    index: usize,
) -> impl Iterator<Item = &'a ResolvedEntity> + 'a {
    rel.get(index)
        .and_then(ResolvedValue::as_list)
        .unwrap_or(&[])
        .iter()
        .filter_map(ResolvedValue::as_handle)
        .map(move |h| graph.get(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityGraph;

    #[test]
    fn test_tree_from_relationships() {
        let content = "ISO-10303-21;\nDATA;\n\
#1=IFCPROJECT('p',$,'Project',$,$,$,$,$,$);\n\
#2=IFCBUILDING('b',$,'Tower',$,$,$,$,$,.ELEMENT.,$,$,$);\n\
#3=IFCBUILDINGSTOREY('s0',$,'Ground',$,$,$,$,$,.ELEMENT.,0.);\n\
#4=IFCBUILDINGSTOREY('s1',$,'First',$,$,$,$,$,.ELEMENT.,3.);\n\
#10=IFCWALL('w1',$,$,$,$,$,$,$);\n\
#11=IFCWALL('w2',$,$,$,$,$,$,$);\n\
#20=IFCRELAGGREGATES('a1',$,$,$,#1,(#2));\n\
#21=IFCRELAGGREGATES('a2',$,$,$,#2,(#3,#4));\n\
#22=IFCRELCONTAINEDINSPATIALSTRUCTURE('c1',$,$,$,(#10),#3);\n\
#23=IFCRELCONTAINEDINSPATIALSTRUCTURE('c2',$,$,$,(#11),#4);\n\
ENDSEC;\n";
        let graph = ResolvedGraph::resolve(EntityGraph::parse(content).unwrap());
        let tree = SpatialTree::build(&graph);

        assert_eq!(tree.roots(), &[1]);
        assert_eq!(tree.node(2).unwrap().children, vec![3, 4]);
        assert_eq!(tree.node(3).unwrap().name.as_deref(), Some("Ground"));
        assert_eq!(tree.elements_under(2), vec![10, 11]);
        assert_eq!(tree.elements_under(4), vec![11]);
    }
}
