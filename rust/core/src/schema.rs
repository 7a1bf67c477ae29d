// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity kinds
//!
//! Type names are mapped to [`EntityKind`] once while parsing, so later
//! stages match on an enum instead of comparing strings.

use std::fmt;

macro_rules! entity_kinds {
    ($( $(#[$meta:meta])* $variant:ident => $name:literal, )*) => {
        /// Kind of a STEP entity, keyed by its upper-case type name
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        pub enum EntityKind {
            $( $(#[$meta])* $variant, )*
            /// Any type name without a dedicated variant
            Unknown(String),
        }

        impl EntityKind {
            /// Map an upper-case type name to its kind
            pub fn from_name(name: &str) -> Self {
                match name {
                    $( $name => Self::$variant, )*
                    other => Self::Unknown(other.to_string()),
                }
            }

            /// Upper-case STEP type name
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $name, )*
                    Self::Unknown(name) => name,
                }
            }
        }
    };
}

entity_kinds! {
    // Building elements
    Wall => "IFCWALL",
    WallStandardCase => "IFCWALLSTANDARDCASE",
    Slab => "IFCSLAB",
    Beam => "IFCBEAM",
    Column => "IFCCOLUMN",
    Roof => "IFCROOF",
    Stair => "IFCSTAIR",
    Railing => "IFCRAILING",
    Covering => "IFCCOVERING",
    CurtainWall => "IFCCURTAINWALL",
    Plate => "IFCPLATE",
    Member => "IFCMEMBER",
    Footing => "IFCFOOTING",
    Door => "IFCDOOR",
    Window => "IFCWINDOW",
    BuildingElementProxy => "IFCBUILDINGELEMENTPROXY",
    FurnishingElement => "IFCFURNISHINGELEMENT",
    OpeningElement => "IFCOPENINGELEMENT",

    // Spatial structure
    Project => "IFCPROJECT",
    Site => "IFCSITE",
    Building => "IFCBUILDING",
    BuildingStorey => "IFCBUILDINGSTOREY",
    Space => "IFCSPACE",

    // Relationships
    RelAggregates => "IFCRELAGGREGATES",
    RelContainedInSpatialStructure => "IFCRELCONTAINEDINSPATIALSTRUCTURE",
    RelDefinesByProperties => "IFCRELDEFINESBYPROPERTIES",
    RelDefinesByType => "IFCRELDEFINESBYTYPE",
    RelAssociatesMaterial => "IFCRELASSOCIATESMATERIAL",
    RelVoidsElement => "IFCRELVOIDSELEMENT",
    RelFillsElement => "IFCRELFILLSELEMENT",

    // Placement and representation
    CartesianPoint => "IFCCARTESIANPOINT",
    CartesianPointList2D => "IFCCARTESIANPOINTLIST2D",
    CartesianPointList3D => "IFCCARTESIANPOINTLIST3D",
    Direction => "IFCDIRECTION",
    Axis2Placement2D => "IFCAXIS2PLACEMENT2D",
    Axis2Placement3D => "IFCAXIS2PLACEMENT3D",
    LocalPlacement => "IFCLOCALPLACEMENT",
    ProductDefinitionShape => "IFCPRODUCTDEFINITIONSHAPE",
    ShapeRepresentation => "IFCSHAPEREPRESENTATION",
    GeometricRepresentationContext => "IFCGEOMETRICREPRESENTATIONCONTEXT",
    GeometricRepresentationSubContext => "IFCGEOMETRICREPRESENTATIONSUBCONTEXT",

    // Geometric items
    ExtrudedAreaSolid => "IFCEXTRUDEDAREASOLID",
    RectangleProfileDef => "IFCRECTANGLEPROFILEDEF",
    CircleProfileDef => "IFCCIRCLEPROFILEDEF",
    ArbitraryClosedProfileDef => "IFCARBITRARYCLOSEDPROFILEDEF",
    ArbitraryProfileDefWithVoids => "IFCARBITRARYPROFILEDEFWITHVOIDS",
    Polyline => "IFCPOLYLINE",
    IndexedPolyCurve => "IFCINDEXEDPOLYCURVE",
    PolyLoop => "IFCPOLYLOOP",
    FaceOuterBound => "IFCFACEOUTERBOUND",
    FaceBound => "IFCFACEBOUND",
    Face => "IFCFACE",
    ClosedShell => "IFCCLOSEDSHELL",
    OpenShell => "IFCOPENSHELL",
    FacetedBrep => "IFCFACETEDBREP",
    ShellBasedSurfaceModel => "IFCSHELLBASEDSURFACEMODEL",
    TriangulatedFaceSet => "IFCTRIANGULATEDFACESET",

    // Units and ownership
    UnitAssignment => "IFCUNITASSIGNMENT",
    SiUnit => "IFCSIUNIT",
    ConversionBasedUnit => "IFCCONVERSIONBASEDUNIT",
    MeasureWithUnit => "IFCMEASUREWITHUNIT",
    DimensionalExponents => "IFCDIMENSIONALEXPONENTS",
    OwnerHistory => "IFCOWNERHISTORY",
    Person => "IFCPERSON",
    Organization => "IFCORGANIZATION",
    PersonAndOrganization => "IFCPERSONANDORGANIZATION",
    Application => "IFCAPPLICATION",

    // Properties and materials
    PropertySet => "IFCPROPERTYSET",
    PropertySingleValue => "IFCPROPERTYSINGLEVALUE",
    ElementQuantity => "IFCELEMENTQUANTITY",
    Material => "IFCMATERIAL",
}

/// Type-name prefixes of resource entities that never render on their own
const RESOURCE_PREFIXES: &[&str] = &[
    "IFCREL",
    "IFCPROPERTY",
    "IFCQUANTITY",
    "IFCMATERIAL",
    "IFCPRESENTATION",
    "IFCSURFACESTYLE",
    "IFCCOLOUR",
    "IFCSTYLEDITEM",
    "IFCCLASSIFICATION",
    "IFCCOMPLEXPROPERTY",
];

impl EntityKind {
    /// Spatial structure elements (project, site, building, storey, space)
    pub fn is_spatial(&self) -> bool {
        matches!(
            self,
            Self::Project | Self::Site | Self::Building | Self::BuildingStorey | Self::Space
        )
    }

    /// Physical products that carry a placement and a representation
    pub fn is_product(&self) -> bool {
        matches!(
            self,
            Self::Wall
                | Self::WallStandardCase
                | Self::Slab
                | Self::Beam
                | Self::Column
                | Self::Roof
                | Self::Stair
                | Self::Railing
                | Self::Covering
                | Self::CurtainWall
                | Self::Plate
                | Self::Member
                | Self::Footing
                | Self::Door
                | Self::Window
                | Self::BuildingElementProxy
                | Self::FurnishingElement
                | Self::OpeningElement
        )
    }

    pub fn is_relationship(&self) -> bool {
        matches!(
            self,
            Self::RelAggregates
                | Self::RelContainedInSpatialStructure
                | Self::RelDefinesByProperties
                | Self::RelDefinesByType
                | Self::RelAssociatesMaterial
                | Self::RelVoidsElement
                | Self::RelFillsElement
        ) || matches!(self, Self::Unknown(name) if name.starts_with("IFCREL"))
    }

    /// Kinds that never produce geometry when they stand alone in a file:
    /// spatial structure, relationships, units, ownership, contexts,
    /// properties, materials, styles and type objects.
    pub fn is_non_geometric(&self) -> bool {
        if self.is_spatial() || self.is_relationship() {
            return true;
        }
        match self {
            Self::UnitAssignment
            | Self::SiUnit
            | Self::ConversionBasedUnit
            | Self::MeasureWithUnit
            | Self::DimensionalExponents
            | Self::OwnerHistory
            | Self::Person
            | Self::Organization
            | Self::PersonAndOrganization
            | Self::Application
            | Self::GeometricRepresentationContext
            | Self::GeometricRepresentationSubContext
            | Self::PropertySet
            | Self::PropertySingleValue
            | Self::ElementQuantity
            | Self::Material => true,
            Self::Unknown(name) => {
                RESOURCE_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
                    || name.ends_with("TYPE")
                    || name.ends_with("UNIT")
            }
            _ => false,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(EntityKind::from_name("IFCWALL"), EntityKind::Wall);
        assert_eq!(EntityKind::from_name("IFCPOLYLINE"), EntityKind::Polyline);
        assert_eq!(
            EntityKind::from_name("IFCFLOWTERMINAL"),
            EntityKind::Unknown("IFCFLOWTERMINAL".to_string())
        );
    }

    #[test]
    fn test_as_str_round_trips_unknown() {
        assert_eq!(EntityKind::Wall.as_str(), "IFCWALL");
        assert_eq!(EntityKind::from_name("IFCPUMP").as_str(), "IFCPUMP");
    }

    #[test]
    fn test_categories() {
        assert!(EntityKind::BuildingStorey.is_spatial());
        assert!(EntityKind::Wall.is_product());
        assert!(EntityKind::RelAggregates.is_relationship());
        assert!(EntityKind::from_name("IFCRELCONNECTSELEMENTS").is_relationship());
        assert!(EntityKind::OwnerHistory.is_non_geometric());
        assert!(EntityKind::from_name("IFCWALLTYPE").is_non_geometric());
        assert!(!EntityKind::Polyline.is_non_geometric());
        assert!(!EntityKind::from_name("IFCFLOWTERMINAL").is_non_geometric());
    }
}
