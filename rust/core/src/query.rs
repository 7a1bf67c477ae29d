// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity queries
//!
//! Filters combine with AND and results keep file order:
//!
//! ```rust,ignore
//! let doors = EntityQuery::new(&graph)
//!     .kind(EntityKind::Door)
//!     .name_contains("fire")
//!     .within(&tree, storey_id)
//!     .execute();
//! ```

use rustc_hash::FxHashSet;

use crate::resolver::{EntityHandle, ResolvedEntity, ResolvedGraph, ResolvedValue};
use crate::schema::EntityKind;
use crate::spatial::SpatialTree;

/// IfcRoot attributes
const GLOBAL_ID: usize = 0;
const NAME: usize = 2;

type Predicate<'a> = Box<dyn Fn(&ResolvedEntity) -> bool + 'a>;

/// Filter builder over a [`ResolvedGraph`]
pub struct EntityQuery<'a> {
    graph: &'a ResolvedGraph,
    filters: Vec<Predicate<'a>>,
}

impl<'a> EntityQuery<'a> {
    pub fn new(graph: &'a ResolvedGraph) -> Self {
        Self {
            graph,
            filters: Vec::new(),
        }
    }

    pub fn kind(self, kind: EntityKind) -> Self {
        self.filter(move |e| e.kind == kind)
    }

    /// Any of `kinds`
    pub fn kinds(self, kinds: &[EntityKind]) -> Self {
        let kinds: FxHashSet<EntityKind> = kinds.iter().cloned().collect();
        self.filter(move |e| kinds.contains(&e.kind))
    }

    /// Name contains `needle`, ignoring case
    pub fn name_contains(self, needle: &str) -> Self {
        let needle = needle.to_lowercase();
        self.filter(move |e| name(e).is_some_and(|n| n.to_lowercase().contains(&needle)))
    }

    pub fn name_equals(self, value: &str) -> Self {
        let value = value.to_string();
        self.filter(move |e| name(e) == Some(value.as_str()))
    }

    pub fn global_id(self, value: &str) -> Self {
        let value = value.to_string();
        self.filter(move |e| e.get(GLOBAL_ID).and_then(ResolvedValue::as_str) == Some(value.as_str()))
    }

    /// Elements contained in spatial node `node` or any container below it
    pub fn within(self, tree: &SpatialTree, node: u64) -> Self {
        let ids: FxHashSet<u64> = tree.elements_under(node).into_iter().collect();
        self.filter(move |e| ids.contains(&e.id))
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ResolvedEntity) -> bool + 'a,
    {
        self.filters.push(Box::new(predicate));
        self
    }

    fn matches(&self, entity: &ResolvedEntity) -> bool {
        self.filters.iter().all(|f| f(entity))
    }

    pub fn handles(&self) -> Vec<EntityHandle> {
        self.graph
            .iter()
            .filter(|(_, e)| self.matches(e))
            .map(|(h, _)| h)
            .collect()
    }

    pub fn execute(&self) -> Vec<&'a ResolvedEntity> {
        let graph = self.graph;
        graph.iter().map(|(_, e)| e).filter(|e| self.matches(e)).collect()
    }

    pub fn first(&self) -> Option<&'a ResolvedEntity> {
        let graph = self.graph;
        graph.iter().map(|(_, e)| e).find(|e| self.matches(e))
    }

    pub fn count(&self) -> usize {
        self.graph.iter().filter(|(_, e)| self.matches(e)).count()
    }

    /// Entity ids of the matches
    pub fn ids(&self) -> Vec<u64> {
        self.execute().into_iter().map(|e| e.id).collect()
    }
}

#[inline]
fn name(entity: &ResolvedEntity) -> Option<&str> {
    entity.get(NAME).and_then(ResolvedValue::as_str)
}

/// Elements contained directly in a storey (not in its spaces)
pub fn elements_in_storey<'a>(
    graph: &'a ResolvedGraph,
    tree: &SpatialTree,
    storey: u64,
) -> Vec<&'a ResolvedEntity> {
    tree.node(storey)
        .map(|node| node.elements.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(|&id| graph.by_id(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EntityGraph;

    const MODEL: &str = "ISO-10303-21;\nDATA;\n\
#1=IFCPROJECT('p',$,'Project',$,$,$,$,$,$);\n\
#2=IFCBUILDINGSTOREY('s0',$,'Ground',$,$,$,$,$,.ELEMENT.,0.);\n\
#3=IFCBUILDINGSTOREY('s1',$,'First',$,$,$,$,$,.ELEMENT.,3.);\n\
#4=IFCSPACE('sp',$,'Kitchen',$,$,$,$,$,.ELEMENT.,.INTERNAL.,$);\n\
#10=IFCWALL('0abc',$,'Exterior Wall',$,$,$,$,$);\n\
#11=IFCWALL('1abc',$,'Interior wall',$,$,$,$,$);\n\
#12=IFCDOOR('2abc',$,'Fire Door',$,$,$,$,$,1.,1.);\n\
#13=IFCSLAB('3abc',$,'Floor',$,$,$,$,$,.FLOOR.);\n\
#14=IFCFURNISHINGELEMENT('4abc',$,'Table',$,$,$,$,$);\n\
#20=IFCRELAGGREGATES('a',$,$,$,#1,(#2,#3));\n\
#21=IFCRELAGGREGATES('b',$,$,$,#2,(#4));\n\
#22=IFCRELCONTAINEDINSPATIALSTRUCTURE('c',$,$,$,(#10,#12),#2);\n\
#23=IFCRELCONTAINEDINSPATIALSTRUCTURE('d',$,$,$,(#11,#13),#3);\n\
#24=IFCRELCONTAINEDINSPATIALSTRUCTURE('e',$,$,$,(#14),#4);\n\
ENDSEC;\n";

    fn model() -> (ResolvedGraph, SpatialTree) {
        let graph = ResolvedGraph::resolve(EntityGraph::parse(MODEL).unwrap());
        let tree = SpatialTree::build(&graph);
        (graph, tree)
    }

    #[test]
    fn test_by_kind_and_name() {
        let (graph, _) = model();
        assert_eq!(EntityQuery::new(&graph).kind(EntityKind::Wall).ids(), vec![10, 11]);
        assert_eq!(
            EntityQuery::new(&graph).name_contains("WALL").ids(),
            vec![10, 11]
        );
        assert_eq!(
            EntityQuery::new(&graph).name_equals("Interior wall").ids(),
            vec![11]
        );
        assert_eq!(
            EntityQuery::new(&graph)
                .kinds(&[EntityKind::Door, EntityKind::Slab])
                .count(),
            2
        );
        assert!(EntityQuery::new(&graph).name_equals("interior wall").first().is_none());
    }

    #[test]
    fn test_by_global_id() {
        let (graph, _) = model();
        let door = EntityQuery::new(&graph).global_id("2abc").first().unwrap();
        assert_eq!(door.id, 12);
        assert_eq!(EntityQuery::new(&graph).global_id("nope").count(), 0);
    }

    #[test]
    fn test_filters_combine() {
        let (graph, tree) = model();
        let query = EntityQuery::new(&graph).kind(EntityKind::Wall).within(&tree, 2);
        assert_eq!(query.ids(), vec![10]);
        assert_eq!(query.handles(), vec![graph.handle(10).unwrap()]);

        // The storey subtree reaches into its space
        let under_ground = EntityQuery::new(&graph).within(&tree, 2).ids();
        assert_eq!(under_ground, vec![10, 12, 14]);

        let named = EntityQuery::new(&graph)
            .filter(|e| e.kind.is_product())
            .name_contains("door")
            .ids();
        assert_eq!(named, vec![12]);
    }

    #[test]
    fn test_storey_contents() {
        let (graph, tree) = model();
        let ids: Vec<u64> = elements_in_storey(&graph, &tree, 2).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 12]);
        let ids: Vec<u64> = elements_in_storey(&graph, &tree, 3).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![11, 13]);
        assert!(elements_in_storey(&graph, &tree, 99).is_empty());
    }
}
