//! Fixed photo tables for both FAI modes and the component type catalog.
//!
//! The inspection backbone is listed in physical traversal order: front rack
//! (full, top half, bottom half), left side, right side, rear rack, then
//! serial/labels and PDUs. The generator slices it into blocks by id prefix.

use crate::types::Orientation::{self, Landscape, Portrait};

/// A hand-specified default photo.
#[derive(Debug, Clone, Copy)]
pub struct DefaultPhoto {
    pub id: &'static str,
    pub name: &'static str,
    pub template: Option<&'static str>,
    pub orientation: Orientation,
    pub location: &'static str,
    pub section: &'static str,
}

const fn photo(
    id: &'static str,
    name: &'static str,
    template: Option<&'static str>,
    orientation: Orientation,
    location: &'static str,
    section: &'static str,
) -> DefaultPhoto {
    DefaultPhoto {
        id,
        name,
        template,
        orientation,
        location,
        section,
    }
}

pub const INSPECTION_DEFAULTS: &[DefaultPhoto] = &[
    photo("FR1", "Front Rack - Full Straight On", Some("FR1.png"), Portrait, "front", "full_rack"),
    photo("FR2", "Front Rack - Full 45 Right", Some("FR2.png"), Portrait, "front", "full_rack"),
    photo("FR3", "Front Rack - Full 45 Left", Some("FR3.png"), Portrait, "front", "full_rack"),
    photo("FR4", "Front Rack - Top Half Straight On", Some("FR4.png"), Portrait, "front", "top_half"),
    photo("FR5", "Front Rack - Top Half 45 Right", Some("FR5.png"), Portrait, "front", "top_half"),
    photo("FR6", "Front Rack - Top Half 45 Left", Some("FR6.png"), Portrait, "front", "top_half"),
    photo("FR7", "Front Rack - Bottom Half Straight On", Some("FR7.png"), Portrait, "front", "bottom_half"),
    photo("FR8", "Front Rack - Bottom Half 45 Right", Some("FR8.png"), Portrait, "front", "bottom_half"),
    photo("FR9", "Front Rack - Bottom Half 45 Left", Some("FR9.png"), Portrait, "front", "bottom_half"),
    photo("LS1", "Left Side - Full", Some("LS1.png"), Portrait, "left_side", "full"),
    photo("LS2", "Left Side - Top Half", Some("LS2.png"), Portrait, "left_side", "top_half"),
    photo("LS3", "Left Side - Bottom Half", Some("LS3.png"), Portrait, "left_side", "bottom_half"),
    photo("RS1", "Right Side - Full", Some("RS1.png"), Portrait, "right_side", "full"),
    photo("RS2", "Right Side - Top Half", Some("RS2.png"), Portrait, "right_side", "top_half"),
    photo("RS3", "Right Side - Bottom Half", Some("RS3.png"), Portrait, "right_side", "bottom_half"),
    photo("RR1", "Rear Rack - Full Straight On", Some("RR1.png"), Portrait, "rear", "full_rack"),
    photo("RR2", "Rear Rack - Full 45 Right", Some("RR2.png"), Portrait, "rear", "full_rack"),
    photo("RR3", "Rear Rack - Full 45 Left", Some("RR3.png"), Portrait, "rear", "full_rack"),
    photo("RR4", "Rear Rack - Top Half Straight On", Some("RR4.png"), Portrait, "rear", "top_half"),
    photo("RR5", "Rear Rack - Top Half 45 Right", Some("RR5.png"), Portrait, "rear", "top_half"),
    photo("RR6", "Rear Rack - Top Half 45 Left", Some("RR6.png"), Portrait, "rear", "top_half"),
    photo("RR7", "Rear Rack - Bottom Half Straight On", Some("RR7.png"), Portrait, "rear", "bottom_half"),
    photo("RR8", "Rear Rack - Bottom Half 45 Right", Some("RR8.png"), Portrait, "rear", "bottom_half"),
    photo("RR9", "Rear Rack - Bottom Half 45 Left", Some("RR9.png"), Portrait, "rear", "bottom_half"),
    photo("SN", "Serial Number Label", None, Landscape, "labels", "serial"),
    photo("LB1", "Label 1", None, Landscape, "labels", "labels"),
    photo("LB2", "Label 2", None, Landscape, "labels", "labels"),
    photo("LB3", "Label 3", None, Landscape, "labels", "labels"),
    photo("PDU1", "PDU Photo 1", None, Portrait, "rear", "pdu"),
    photo("PDU2", "PDU Photo 2", None, Portrait, "rear", "pdu"),
    photo("PDU3", "PDU Photo 3", None, Portrait, "rear", "pdu"),
    photo("PDU4", "PDU Photo 4", None, Portrait, "rear", "pdu"),
    photo("PDU5", "PDU Photo 5", None, Portrait, "rear", "pdu"),
    photo("PDU6", "PDU Photo 6", None, Portrait, "rear", "pdu"),
];

pub const PACKOUT_DEFAULTS: &[DefaultPhoto] = &[
    photo("PK_FR1", "Packout Front - Before Shipping Bag", None, Portrait, "front", "before_bag"),
    photo("PK_RR1", "Packout Rear - Before Shipping Bag", None, Portrait, "rear", "before_bag"),
    photo("PK_SA1", "Packout Side A - Before Shipping Bag", None, Portrait, "side_a", "before_bag"),
    photo("PK_SB1", "Packout Side B - Before Shipping Bag", None, Portrait, "side_b", "before_bag"),
    photo("PK_FR2", "Packout Front - Fully Packaged", None, Portrait, "front", "fully_packaged"),
    photo("PK_RR2", "Packout Rear - Fully Packaged", None, Portrait, "rear", "fully_packaged"),
    photo("PK_SA2", "Packout Side A - Fully Packaged", None, Portrait, "side_a", "fully_packaged"),
    photo("PK_SB2", "Packout Side B - Fully Packaged", None, Portrait, "side_b", "fully_packaged"),
    photo("PK_RA1", "Ride Along Items - Overview", None, Landscape, "ride_along", "items"),
    photo("PK_LB1", "Package Labels - Close Up", None, Landscape, "labels", "package_labels"),
    photo("PK_LB2", "Paperwork - Close Up", None, Landscape, "labels", "paperwork"),
];

pub const PACKOUT_DOOR_BRANDING: &[DefaultPhoto] = &[
    photo("PK_DB1", "Door Branding - Front", None, Portrait, "front", "door_branding"),
    photo("PK_DB2", "Door Branding - Rear", None, Portrait, "rear", "door_branding"),
];

/// One camera angle for a component unit.
#[derive(Debug, Clone, Copy)]
pub struct Angle {
    pub suffix: &'static str,
    pub name: &'static str,
    pub template: Option<&'static str>,
    pub orientation: Orientation,
}

const fn angle(
    suffix: &'static str,
    name: &'static str,
    template: Option<&'static str>,
) -> Angle {
    Angle {
        suffix,
        name,
        template,
        orientation: Landscape,
    }
}

/// The front- or rear-facing half of a component type.
#[derive(Debug, Clone, Copy)]
pub struct AngleSet {
    pub prefix: &'static str,
    pub location: &'static str,
    pub angles: &'static [Angle],
}

/// A component type whose photos are generated per unit.
#[derive(Debug, Clone, Copy)]
pub struct ComponentType {
    pub key: &'static str,
    pub label: &'static str,
    pub front: AngleSet,
    pub rear: Option<AngleSet>,
}

impl ComponentType {
    /// Photos generated for one unit (front plus rear angles).
    pub fn photos_per_unit(&self) -> usize {
        self.front.angles.len() + self.rear.map_or(0, |r| r.angles.len())
    }
}

/// Component types in declaration order; generation iterates this slice.
pub const COMPONENT_TYPES: &[ComponentType] = &[
    ComponentType {
        key: "switches",
        label: "Switch Stack",
        front: AngleSet {
            prefix: "SW",
            location: "front",
            angles: &[angle("T", "Top", Some("Sw-T.png")), angle("B", "Bottom", Some("SW-B.png"))],
        },
        rear: Some(AngleSet {
            prefix: "BSW",
            location: "rear",
            angles: &[angle("F", "Front", None), angle("L", "Left", None), angle("R", "Right", None)],
        }),
    },
    ComponentType {
        key: "servers",
        label: "Server Group",
        front: AngleSet {
            prefix: "SV",
            location: "front",
            angles: &[
                angle("F", "Front", Some("SV-F.png")),
                angle("B", "Bottom", Some("SV-B.png")),
                angle("L", "Left", Some("SV-L.png")),
                angle("R", "Right", Some("SV-R.png")),
            ],
        },
        rear: Some(AngleSet {
            prefix: "BSV",
            location: "rear",
            angles: &[
                angle("F", "Front", Some("BSV-F.png")),
                angle("L", "Left", Some("BSV-L.png")),
                angle("R", "Right", Some("BSV-R.png")),
            ],
        }),
    },
    ComponentType {
        key: "corning_edge",
        label: "Corning Edge",
        front: AngleSet {
            prefix: "CE",
            location: "front",
            angles: &[angle("C", "Closed", Some("CE-C.png")), angle("O", "Open", Some("CE-O.png"))],
        },
        rear: None,
    },
    ComponentType {
        key: "cable_labels",
        label: "Cable Type",
        front: AngleSet {
            prefix: "CL",
            location: "labels",
            angles: &[angle("A", "End A", Some("CL.png")), angle("B", "End B", Some("CL.png"))],
        },
        rear: None,
    },
    ComponentType {
        key: "cable_bend",
        label: "Cable Bend Test",
        front: AngleSet {
            prefix: "CB",
            location: "labels",
            angles: &[angle("", "", Some("CB.png"))],
        },
        rear: None,
    },
];

/// Look up a component type by key.
pub fn component_type(key: &str) -> Option<&'static ComponentType> {
    COMPONENT_TYPES.iter().find(|t| t.key == key)
}
