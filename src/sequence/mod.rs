//! Sequence generator: mode + component quantities -> ordered photo queue.
//!
//! Generation is pure and deterministic. The queue order is what the operator
//! walks through, so identical inputs must always yield the identical list.

pub mod catalog;
pub mod naming;

use crate::session::types::{ComponentQuantities, PackoutOptions, PhotoSpec};
use crate::types::Mode;

use catalog::{
    AngleSet, ComponentType, DefaultPhoto, COMPONENT_TYPES, INSPECTION_DEFAULTS,
    PACKOUT_DEFAULTS, PACKOUT_DOOR_BRANDING,
};
pub use naming::Naming;

/// Build the photo queue for a session.
///
/// Unknown component keys are ignored. An empty result means there is nothing
/// to capture; callers surface that to the operator rather than failing.
pub fn generate(
    mode: Mode,
    quantities: &ComponentQuantities,
    options: PackoutOptions,
    naming: &Naming,
) -> Vec<PhotoSpec> {
    let mut builder = QueueBuilder {
        mode,
        naming,
        queue: Vec::with_capacity(expected_count(mode, quantities, options)),
    };

    match mode {
        Mode::Inspection => {
            for (key, qty) in quantities.iter() {
                if qty > 0 && catalog::component_type(key).is_none() {
                    tracing::warn!(key = %key, "Ignoring unknown component type");
                }
            }
            let (front, rear) = component_blocks(quantities);

            builder.defaults_with_prefix("FR");
            builder.extend(front);
            builder.defaults_with_prefix("LS");
            builder.defaults_with_prefix("RS");
            builder.defaults_with_prefix("RR");
            builder.extend(rear);
            builder.defaults_with_prefix("PDU");
            builder.defaults_matching(|p| p.id == "SN");
            builder.defaults_with_prefix("LB");
        }
        Mode::Packout => {
            builder.push_defaults(PACKOUT_DEFAULTS);
            if options.door_branding {
                builder.push_defaults(PACKOUT_DOOR_BRANDING);
            }
        }
    }

    tracing::debug!(mode = mode.as_str(), count = builder.queue.len(), "Generated photo queue");
    builder.queue
}

/// Number of photos [`generate`] would emit, without building the queue.
pub fn expected_count(
    mode: Mode,
    quantities: &ComponentQuantities,
    options: PackoutOptions,
) -> usize {
    match mode {
        Mode::Inspection => {
            let components: usize = COMPONENT_TYPES
                .iter()
                .map(|t| quantities.get(t.key) as usize * t.photos_per_unit())
                .sum();
            INSPECTION_DEFAULTS.len() + components
        }
        Mode::Packout => {
            let branding = if options.door_branding {
                PACKOUT_DOOR_BRANDING.len()
            } else {
                0
            };
            PACKOUT_DEFAULTS.len() + branding
        }
    }
}

/// Photo spec without a filename yet; the builder assigns it.
struct Draft {
    id: String,
    display_name: String,
    template: Option<&'static str>,
    orientation: crate::types::Orientation,
    location: &'static str,
    section: &'static str,
    component_type: Option<&'static str>,
    unit_number: Option<u32>,
}

impl From<&DefaultPhoto> for Draft {
    fn from(p: &DefaultPhoto) -> Self {
        Self {
            id: p.id.to_string(),
            display_name: p.name.to_string(),
            template: p.template,
            orientation: p.orientation,
            location: p.location,
            section: p.section,
            component_type: None,
            unit_number: None,
        }
    }
}

/// Expand every component type with a positive quantity into its front and
/// rear blocks, in declaration order.
fn component_blocks(quantities: &ComponentQuantities) -> (Vec<Draft>, Vec<Draft>) {
    let mut front = Vec::new();
    let mut rear = Vec::new();

    for ty in COMPONENT_TYPES {
        let qty = quantities.get(ty.key);
        for unit in 1..=qty {
            unit_drafts(ty, &ty.front, unit, "", &mut front);
            if let Some(back) = &ty.rear {
                unit_drafts(ty, back, unit, "Back ", &mut rear);
            }
        }
    }

    (front, rear)
}

fn unit_drafts(
    ty: &ComponentType,
    set: &AngleSet,
    unit: u32,
    name_prefix: &str,
    out: &mut Vec<Draft>,
) {
    for angle in set.angles {
        let id = if angle.suffix.is_empty() {
            format!("{}{}", set.prefix, unit)
        } else {
            format!("{}{}-{}", set.prefix, unit, angle.suffix)
        };
        let display_name = if angle.name.is_empty() {
            format!("{}{} {}", name_prefix, ty.label, unit)
        } else {
            format!("{}{} {} - {}", name_prefix, ty.label, unit, angle.name)
        };
        out.push(Draft {
            id,
            display_name,
            template: angle.template,
            orientation: angle.orientation,
            location: set.location,
            section: ty.key,
            component_type: Some(ty.key),
            unit_number: Some(unit),
        });
    }
}

struct QueueBuilder<'a> {
    mode: Mode,
    naming: &'a Naming,
    queue: Vec<PhotoSpec>,
}

impl QueueBuilder<'_> {
    fn defaults_with_prefix(&mut self, prefix: &str) {
        self.defaults_matching(|p| p.id.starts_with(prefix));
    }

    fn defaults_matching(&mut self, pred: impl Fn(&DefaultPhoto) -> bool) {
        for p in INSPECTION_DEFAULTS.iter().filter(|p| pred(*p)) {
            self.push(Draft::from(p));
        }
    }

    fn push_defaults(&mut self, photos: &[DefaultPhoto]) {
        for p in photos {
            self.push(Draft::from(p));
        }
    }

    fn extend(&mut self, drafts: Vec<Draft>) {
        for d in drafts {
            self.push(d);
        }
    }

    fn push(&mut self, d: Draft) {
        let filename = self.naming.photo_filename(self.mode, &d.id);
        self.queue.push(PhotoSpec {
            id: d.id,
            display_name: d.display_name,
            template: d.template.map(str::to_string),
            orientation: d.orientation,
            location: d.location.to_string(),
            section: d.section.to_string(),
            component_type: d.component_type.map(str::to_string),
            unit_number: d.unit_number,
            filename,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn naming() -> Naming {
        Naming::new(Some("PN1"), Some("SN1"), NaiveDate::from_ymd_opt(2026, 1, 2).unwrap())
    }

    fn ids(queue: &[PhotoSpec]) -> Vec<&str> {
        queue.iter().map(|p| p.id.as_str()).collect()
    }

    fn position(queue: &[PhotoSpec], id: &str) -> usize {
        queue.iter().position(|p| p.id == id).unwrap()
    }

    #[test]
    fn test_inspection_defaults_only() {
        let queue = generate(
            Mode::Inspection,
            &ComponentQuantities::new(),
            PackoutOptions::default(),
            &naming(),
        );
        assert_eq!(queue.len(), INSPECTION_DEFAULTS.len());
        let ids = ids(&queue);
        assert_eq!(&ids[..3], &["FR1", "FR2", "FR3"]);
        assert_eq!(ids[9], "LS1");
        assert_eq!(ids[12], "RS1");
        assert_eq!(ids[15], "RR1");
        assert_eq!(ids[24], "PDU1");
        assert_eq!(ids[30], "SN");
        assert_eq!(&ids[31..], &["LB1", "LB2", "LB3"]);
    }

    #[test]
    fn test_single_switch_placement() {
        let quantities = ComponentQuantities::new()
            .with("switches", 1)
            .with("servers", 0);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());

        assert_eq!(queue.len(), INSPECTION_DEFAULTS.len() + 5);

        // Front switch block sits between FR9 and LS1.
        let fr9 = position(&queue, "FR9");
        assert_eq!(queue[fr9 + 1].id, "SW1-T");
        assert_eq!(queue[fr9 + 2].id, "SW1-B");
        assert_eq!(queue[fr9 + 3].id, "LS1");

        // Rear switch block sits between RR9 and the PDUs.
        let rr9 = position(&queue, "RR9");
        assert_eq!(
            ids(&queue[rr9 + 1..rr9 + 5]),
            vec!["BSW1-F", "BSW1-L", "BSW1-R", "PDU1"]
        );
        assert!(position(&queue, "BSW1-R") < position(&queue, "SN"));
    }

    #[test]
    fn test_component_entry_fields() {
        let quantities = ComponentQuantities::new().with("servers", 2);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());

        let front = &queue[position(&queue, "SV2-L")];
        assert_eq!(front.display_name, "Server Group 2 - Left");
        assert_eq!(front.template.as_deref(), Some("SV-L.png"));
        assert_eq!(front.location, "front");
        assert_eq!(front.section, "servers");
        assert_eq!(front.component_type.as_deref(), Some("servers"));
        assert_eq!(front.unit_number, Some(2));
        assert_eq!(front.filename, "PN1_SN1_SV2-L.jpg");

        let rear = &queue[position(&queue, "BSV1-F")];
        assert_eq!(rear.display_name, "Back Server Group 1 - Front");
        assert_eq!(rear.location, "rear");
    }

    #[test]
    fn test_component_declaration_order() {
        let quantities = ComponentQuantities::new()
            .with("cable_bend", 1)
            .with("corning_edge", 1)
            .with("switches", 1);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        let fr9 = position(&queue, "FR9");
        assert_eq!(
            ids(&queue[fr9 + 1..fr9 + 6]),
            vec!["SW1-T", "SW1-B", "CE1-C", "CE1-O", "CB1"]
        );
        let cb = &queue[position(&queue, "CB1")];
        assert_eq!(cb.display_name, "Cable Bend Test 1");
    }

    #[test]
    fn test_units_grouped_per_unit() {
        let quantities = ComponentQuantities::new().with("switches", 2);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        let fr9 = position(&queue, "FR9");
        assert_eq!(
            ids(&queue[fr9 + 1..fr9 + 5]),
            vec!["SW1-T", "SW1-B", "SW2-T", "SW2-B"]
        );
    }

    #[test]
    fn test_count_matches_formula() {
        let quantities = ComponentQuantities::new()
            .with("switches", 3)
            .with("servers", 2)
            .with("corning_edge", 1)
            .with("cable_labels", 4)
            .with("cable_bend", 2);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        let expected = 34 + 3 * 5 + 2 * 7 + 2 + 4 * 2 + 2;
        assert_eq!(queue.len(), expected);
        assert_eq!(
            expected_count(Mode::Inspection, &quantities, PackoutOptions::default()),
            expected
        );

        let rear = queue.iter().filter(|p| p.id.starts_with('B') && p.component_type.is_some());
        assert_eq!(rear.count(), 3 * 3 + 2 * 3);
    }

    #[test]
    fn test_ids_unique() {
        let quantities = ComponentQuantities::new()
            .with("switches", 12)
            .with("servers", 11);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        let unique: HashSet<&str> = queue.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(unique.len(), queue.len());
    }

    #[test]
    fn test_deterministic() {
        let quantities = ComponentQuantities::new()
            .with("servers", 3)
            .with("cable_labels", 2);
        let a = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        let b = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        assert_eq!(a, b);
    }

    #[test]
    fn test_unknown_component_ignored() {
        let quantities = ComponentQuantities::new().with("toasters", 5);
        let queue = generate(Mode::Inspection, &quantities, PackoutOptions::default(), &naming());
        assert_eq!(queue.len(), INSPECTION_DEFAULTS.len());
        assert_eq!(
            expected_count(Mode::Inspection, &quantities, PackoutOptions::default()),
            INSPECTION_DEFAULTS.len()
        );
    }

    #[test]
    fn test_packout_branding() {
        let quantities = ComponentQuantities::new().with("switches", 4);
        let plain = generate(Mode::Packout, &quantities, PackoutOptions::default(), &naming());
        assert_eq!(plain.len(), PACKOUT_DEFAULTS.len());

        let branded = generate(
            Mode::Packout,
            &quantities,
            PackoutOptions { door_branding: true },
            &naming(),
        );
        assert_eq!(branded.len(), PACKOUT_DEFAULTS.len() + 2);
        assert_eq!(&branded[..plain.len()], &plain[..]);
        assert_eq!(ids(&branded[plain.len()..]), vec!["PK_DB1", "PK_DB2"]);

        // Component quantities never count toward a packout queue.
        assert_eq!(
            expected_count(Mode::Packout, &quantities, PackoutOptions::default()),
            plain.len()
        );
        assert_eq!(
            expected_count(Mode::Packout, &quantities, PackoutOptions { door_branding: true }),
            branded.len()
        );
        assert_eq!(branded.len(), PACKOUT_DEFAULTS.len() + PACKOUT_DOOR_BRANDING.len());
    }

    #[test]
    fn test_filenames_follow_naming() {
        let naming = Naming::new(None, None, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        let queue = generate(
            Mode::Packout,
            &ComponentQuantities::new(),
            PackoutOptions::default(),
            &naming,
        );
        assert_eq!(queue[0].filename, "FAI_Packout_2026-01-02_PK_FR1.jpg");
    }
}
