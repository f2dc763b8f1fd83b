use crate::models::Section;

use super::Sections;

/// Persistence work implied by moving from one section set to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionDiff {
    /// Sections that are new or whose fields changed. Each one is written with
    /// the delete-by-endpoints-then-save pattern.
    pub changed: Vec<Section>,
    /// Stored sections that disappeared without a successor carrying their id.
    pub removed: Vec<Section>,
}

impl SectionDiff {
    /// Whether there is nothing to persist.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

impl Sections {
    /// Compare this snapshot against `after` and return what storage must do
    /// to reach `after`.
    pub fn changed_sections(&self, after: &Sections) -> SectionDiff {
        let changed = after
            .iter()
            .filter(|section| !self.sections.contains(section))
            .cloned()
            .collect();

        let removed = self
            .iter()
            .filter(|section| !after.sections.contains(section))
            .filter(|section| match section.id() {
                Some(id) => !after.iter().any(|other| other.id() == Some(id)),
                None => false,
            })
            .cloned()
            .collect();

        SectionDiff { changed, removed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineId, SectionId, Station};

    fn station(id: i64) -> Station {
        Station::new(id, format!("S{id}"))
    }

    fn stored(id: i64, up: i64, down: i64, distance: u32) -> Section {
        Section::with_id(
            Some(SectionId(id)),
            LineId(1),
            station(up),
            station(down),
            distance,
        )
        .expect("valid section")
    }

    #[test]
    fn identical_sets_produce_no_work() {
        let before = Sections::new(vec![stored(1, 1, 2, 5), stored(2, 2, 3, 7)]);
        let after = Sections::new(vec![stored(2, 2, 3, 7), stored(1, 1, 2, 5)]);
        assert!(before.changed_sections(&after).is_empty());
    }

    #[test]
    fn endpoint_insertion_only_adds() -> anyhow::Result<()> {
        let before = Sections::new(vec![stored(1, 1, 2, 5), stored(2, 2, 3, 7)]);
        let mut after = before.clone();
        after.insert(LineId(1), station(4), station(1), 3)?;

        let diff = before.changed_sections(&after);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].up_station().id.0, 4);
        assert!(diff.removed.is_empty());
        Ok(())
    }

    #[test]
    fn split_reports_mutated_and_new_sections() -> anyhow::Result<()> {
        let before = Sections::new(vec![stored(1, 1, 2, 10)]);
        let mut after = before.clone();
        after.insert(LineId(1), station(1), station(3), 4)?;

        let diff = before.changed_sections(&after);
        assert_eq!(diff.changed.len(), 2);
        assert!(diff.removed.is_empty(), "mutated section keeps its id");
        Ok(())
    }

    #[test]
    fn removal_reports_dropped_section() -> anyhow::Result<()> {
        let before = Sections::new(vec![stored(1, 1, 2, 5), stored(2, 2, 3, 7)]);
        let mut after = before.clone();
        after.remove_station(&station(2))?;

        let diff = before.changed_sections(&after);
        assert_eq!(diff.changed.len(), 1);
        assert_eq!(diff.changed[0].distance(), 12);
        assert_eq!(diff.removed, vec![stored(2, 2, 3, 7)]);
        Ok(())
    }
}
