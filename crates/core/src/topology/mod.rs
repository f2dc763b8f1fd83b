//! Ordering and editing of a line's sections.
//!
//! Sections are stored without any order. [`Sections`] rebuilds the single
//! station chain they describe, extends it at either end, splits an interior
//! section, removes stations, and diffs two snapshots so storage only sees
//! the rows that actually changed.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    error::{Result, SubwayError},
    models::{LineId, Section, Station, StationId},
};

mod diff;

pub use diff::SectionDiff;

/// What reconstruction does when the walk from the head does not reach every
/// section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraversalPolicy {
    /// Fail with a malformed-topology error.
    #[default]
    Strict,
    /// Return the reachable prefix and log the unreachable remainder.
    Lenient,
}

/// Unordered collection of one line's sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    sections: Vec<Section>,
}

impl Sections {
    /// Wrap a set of sections in any order.
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    /// Sections in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether no section is present.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Whether `station` is an endpoint of any section.
    pub fn contains_station(&self, station: &Station) -> bool {
        self.sections.iter().any(|section| section.touches(station))
    }

    pub(crate) fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    /// Sections ordered from head to tail.
    pub fn sorted_sections(&self, policy: TraversalPolicy) -> Result<Vec<Section>> {
        if self.sections.is_empty() {
            return Err(SubwayError::malformed("line has no sections"));
        }

        let adjacency = Adjacency::build(&self.sections)?;
        let mut current = adjacency.head(&self.sections, policy)?;
        let mut ordered = Vec::with_capacity(self.sections.len());

        // Branches are rejected by `Adjacency::build`, so the walk cannot
        // revisit a section; the length bound is a backstop.
        while ordered.len() < self.sections.len() {
            let section = &self.sections[current];
            ordered.push(section.clone());
            match adjacency.outgoing.get(&section.down_station().id) {
                Some(&next) => current = next,
                None => break,
            }
        }

        if ordered.len() < self.sections.len() {
            let missing = self.sections.len() - ordered.len();
            match policy {
                TraversalPolicy::Strict => {
                    return Err(SubwayError::malformed(format!(
                        "{missing} section(s) are not reachable from the head station"
                    )));
                }
                TraversalPolicy::Lenient => {
                    warn!(
                        missing,
                        total = self.sections.len(),
                        "Dropping sections unreachable from the head station"
                    );
                }
            }
        }

        debug!(sections = ordered.len(), "Sections ordered");
        Ok(ordered)
    }

    /// Stations from head to tail.
    pub fn stations(&self, policy: TraversalPolicy) -> Result<Vec<Station>> {
        let ordered = self.sorted_sections(policy)?;
        let mut stations = Vec::with_capacity(ordered.len() + 1);
        if let Some(head) = ordered.first() {
            stations.push(head.up_station().clone());
        }
        stations.extend(ordered.iter().map(|section| section.down_station().clone()));
        stations.dedup();
        Ok(stations)
    }

    /// Add a section to the chain.
    ///
    /// The section extends the chain when its down station is the head or its
    /// up station is the tail. Otherwise it must share exactly one station
    /// with an existing section, which is shrunk so the span keeps its total
    /// distance.
    pub fn insert(
        &mut self,
        line_id: LineId,
        up_station: Station,
        down_station: Station,
        distance: u32,
    ) -> Result<()> {
        let candidate = Section::new(line_id, up_station, down_station, distance)?;
        if self.sections.is_empty() {
            self.sections.push(candidate);
            return Ok(());
        }

        let ordered = self.sorted_sections(TraversalPolicy::Strict)?;
        let has_up = self.contains_station(candidate.up_station());
        let has_down = self.contains_station(candidate.down_station());
        if has_up && has_down {
            return Err(SubwayError::invalid(format!(
                "{} and {} are already on the line",
                candidate.up_station(),
                candidate.down_station()
            )));
        }
        if !has_up && !has_down {
            return Err(SubwayError::invalid(format!(
                "neither {} nor {} is on the line",
                candidate.up_station(),
                candidate.down_station()
            )));
        }

        let (Some(head), Some(tail)) = (ordered.first(), ordered.last()) else {
            return Err(SubwayError::malformed("line has no sections"));
        };

        if candidate.same_down_station(head.up_station()) {
            return self.upward_end_point(candidate);
        }
        if candidate.same_up_station(tail.down_station()) {
            return self.downward_end_point(candidate);
        }
        self.split(candidate)
    }

    fn upward_end_point(&mut self, candidate: Section) -> Result<()> {
        debug!(section = %candidate, "Extending line at head");
        self.sections.push(candidate);
        Ok(())
    }

    fn downward_end_point(&mut self, candidate: Section) -> Result<()> {
        debug!(section = %candidate, "Extending line at tail");
        self.sections.push(candidate);
        Ok(())
    }

    fn split(&mut self, candidate: Section) -> Result<()> {
        if let Some(existing) = self
            .sections
            .iter_mut()
            .find(|section| section.same_up_station(candidate.up_station()))
        {
            let remainder = remaining_distance(existing.distance(), candidate.distance())?;
            existing.change_up_station(candidate.down_station().clone(), remainder)?;
        } else if let Some(existing) = self
            .sections
            .iter_mut()
            .find(|section| section.same_down_station(candidate.down_station()))
        {
            let remainder = remaining_distance(existing.distance(), candidate.distance())?;
            existing.change_down_station(candidate.up_station().clone(), remainder)?;
        } else {
            return Err(SubwayError::invalid(format!(
                "no section starts at {} or ends at {}",
                candidate.up_station(),
                candidate.down_station()
            )));
        }

        debug!(section = %candidate, "Split interior section");
        self.sections.push(candidate);
        Ok(())
    }

    /// Take `station` off the chain.
    ///
    /// A boundary station drops its section; an interior station merges its
    /// two sections into one covering both distances.
    pub fn remove_station(&mut self, station: &Station) -> Result<()> {
        if !self.contains_station(station) {
            return Err(SubwayError::invalid(format!("{station} is not on the line")));
        }
        if self.sections.len() <= 1 {
            return Err(SubwayError::invalid(
                "a line must keep at least one section",
            ));
        }
        self.sorted_sections(TraversalPolicy::Strict)?;

        let upper = self
            .sections
            .iter()
            .position(|section| section.same_down_station(station));
        let lower = self
            .sections
            .iter()
            .position(|section| section.same_up_station(station));

        match (upper, lower) {
            (Some(upper), Some(lower)) => {
                let lower_section = self.sections[lower].clone();
                let merged = self.sections[upper]
                    .distance()
                    .checked_add(lower_section.distance())
                    .ok_or_else(|| SubwayError::invalid("merged distance overflows"))?;
                self.sections[upper]
                    .change_down_station(lower_section.down_station().clone(), merged)?;
                self.sections.remove(lower);
            }
            (Some(index), None) | (None, Some(index)) => {
                self.sections.remove(index);
            }
            (None, None) => {
                return Err(SubwayError::invalid(format!("{station} is not on the line")));
            }
        }
        Ok(())
    }
}

fn remaining_distance(existing: u32, requested: u32) -> Result<u32> {
    if requested >= existing {
        return Err(SubwayError::InvalidDistance {
            existing,
            requested,
        });
    }
    Ok(existing - requested)
}

/// Station id to section index, built once per reconstruction.
struct Adjacency {
    outgoing: HashMap<StationId, usize>,
    incoming: HashMap<StationId, usize>,
}

impl Adjacency {
    fn build(sections: &[Section]) -> Result<Self> {
        let mut outgoing = HashMap::with_capacity(sections.len());
        let mut incoming = HashMap::with_capacity(sections.len());
        for (index, section) in sections.iter().enumerate() {
            if outgoing.insert(section.up_station().id, index).is_some() {
                return Err(SubwayError::malformed(format!(
                    "{} has more than one outgoing section",
                    section.up_station()
                )));
            }
            if incoming.insert(section.down_station().id, index).is_some() {
                return Err(SubwayError::malformed(format!(
                    "{} has more than one incoming section",
                    section.down_station()
                )));
            }
        }
        Ok(Self { outgoing, incoming })
    }

    fn head(&self, sections: &[Section], policy: TraversalPolicy) -> Result<usize> {
        let mut heads = sections
            .iter()
            .enumerate()
            .filter(|(_, section)| !self.incoming.contains_key(&section.up_station().id))
            .map(|(index, _)| index);

        let head = heads
            .next()
            .ok_or_else(|| SubwayError::malformed("no head station; sections form a cycle"))?;
        let extra = heads.count();
        if extra > 0 {
            match policy {
                TraversalPolicy::Strict => {
                    return Err(SubwayError::malformed(format!(
                        "found {} head stations; sections form more than one chain",
                        extra + 1
                    )));
                }
                TraversalPolicy::Lenient => {
                    warn!(heads = extra + 1, "Several head stations; using the first");
                }
            }
        }
        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const LINE: LineId = LineId(1);

    fn station(id: i64) -> Station {
        Station::new(id, format!("S{id}"))
    }

    fn section(up: i64, down: i64, distance: u32) -> Section {
        Section::new(LINE, station(up), station(down), distance).expect("valid section")
    }

    fn ids(stations: &[Station]) -> Vec<i64> {
        stations.iter().map(|station| station.id.0).collect()
    }

    fn chain(order: &[i64]) -> Vec<Section> {
        order
            .windows(2)
            .enumerate()
            .map(|(idx, pair)| section(pair[0], pair[1], idx as u32 + 1))
            .collect()
    }

    fn permutations(items: Vec<Section>) -> Vec<Vec<Section>> {
        fn heap(k: usize, items: &mut Vec<Section>, out: &mut Vec<Vec<Section>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            for i in 0..k {
                heap(k - 1, items, out);
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
            }
        }
        let mut items = items;
        let mut out = Vec::new();
        let len = items.len();
        heap(len, &mut items, &mut out);
        out
    }

    /// A(1) -> B(2) -> C(3) with distances 5 and 7.
    fn abc() -> Sections {
        Sections::new(vec![section(2, 3, 7), section(1, 2, 5)])
    }

    #[test]
    fn single_section_reconstructs_both_stations() -> anyhow::Result<()> {
        let sections = Sections::new(vec![section(1, 2, 10)]);
        assert_eq!(ids(&sections.stations(TraversalPolicy::Strict)?), vec![1, 2]);
        Ok(())
    }

    #[test]
    fn reconstruction_ignores_input_order() -> anyhow::Result<()> {
        let order = [4, 1, 5, 2, 3, 6];
        for permutation in permutations(chain(&order)) {
            let stations = Sections::new(permutation).stations(TraversalPolicy::Strict)?;
            assert_eq!(ids(&stations), order.to_vec());
        }
        Ok(())
    }

    #[test]
    fn sorted_sections_link_down_to_up() -> anyhow::Result<()> {
        let ordered = abc().sorted_sections(TraversalPolicy::Strict)?;
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].down_station(), ordered[1].up_station());
        Ok(())
    }

    #[test]
    fn empty_set_is_malformed() {
        let err = Sections::default()
            .stations(TraversalPolicy::Strict)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);
    }

    #[test]
    fn cycle_is_malformed() {
        let sections = Sections::new(vec![section(1, 2, 1), section(2, 3, 1), section(3, 1, 1)]);
        let err = sections.stations(TraversalPolicy::Lenient).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);
    }

    #[test]
    fn branch_is_malformed() {
        let sections = Sections::new(vec![section(1, 2, 1), section(1, 3, 1)]);
        let err = sections.stations(TraversalPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);
    }

    #[test]
    fn detached_cycle_fails_strict_and_is_dropped_leniently() -> anyhow::Result<()> {
        let sections = Sections::new(vec![
            section(1, 2, 1),
            section(2, 3, 1),
            section(10, 11, 1),
            section(11, 10, 1),
        ]);
        let err = sections.stations(TraversalPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);
        assert_eq!(
            ids(&sections.stations(TraversalPolicy::Lenient)?),
            vec![1, 2, 3]
        );
        Ok(())
    }

    #[test]
    fn two_chains_fail_strict() {
        let sections = Sections::new(vec![section(1, 2, 1), section(5, 6, 1)]);
        let err = sections.stations(TraversalPolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTopology);
    }

    #[test]
    fn two_chains_leniently_keep_the_first() -> anyhow::Result<()> {
        let sections = Sections::new(vec![section(5, 6, 1), section(1, 2, 1), section(2, 3, 1)]);
        assert_eq!(
            ids(&sections.stations(TraversalPolicy::Lenient)?),
            vec![5, 6]
        );
        Ok(())
    }

    #[test]
    fn upward_insertion_prepends() -> anyhow::Result<()> {
        let mut sections = abc();
        sections.insert(LINE, station(4), station(1), 3)?;
        assert_eq!(
            ids(&sections.stations(TraversalPolicy::Strict)?),
            vec![4, 1, 2, 3]
        );
        assert!(sections.iter().any(|s| *s == section(4, 1, 3)));
        assert!(sections.iter().any(|s| *s == section(1, 2, 5)));
        assert!(sections.iter().any(|s| *s == section(2, 3, 7)));
        Ok(())
    }

    #[test]
    fn downward_insertion_appends() -> anyhow::Result<()> {
        let mut sections = abc();
        sections.insert(LINE, station(3), station(5), 4)?;
        assert_eq!(
            ids(&sections.stations(TraversalPolicy::Strict)?),
            vec![1, 2, 3, 5]
        );
        assert!(sections.iter().any(|s| *s == section(3, 5, 4)));
        assert_eq!(sections.len(), 3);
        Ok(())
    }

    #[test]
    fn split_from_shared_up_station_preserves_distance() -> anyhow::Result<()> {
        let mut sections = abc();
        sections.insert(LINE, station(1), station(9), 2)?;
        assert_eq!(
            ids(&sections.stations(TraversalPolicy::Strict)?),
            vec![1, 9, 2, 3]
        );
        assert!(sections.iter().any(|s| *s == section(1, 9, 2)));
        assert!(sections.iter().any(|s| *s == section(9, 2, 3)));
        let total: u32 = sections.iter().map(Section::distance).sum();
        assert_eq!(total, 12);
        Ok(())
    }

    #[test]
    fn split_from_shared_down_station_preserves_distance() -> anyhow::Result<()> {
        let mut sections = abc();
        sections.insert(LINE, station(9), station(3), 3)?;
        assert_eq!(
            ids(&sections.stations(TraversalPolicy::Strict)?),
            vec![1, 2, 9, 3]
        );
        assert!(sections.iter().any(|s| *s == section(2, 9, 4)));
        assert!(sections.iter().any(|s| *s == section(9, 3, 3)));
        Ok(())
    }

    #[test]
    fn split_requires_shorter_section() {
        let mut sections = abc();
        let err = sections
            .insert(LINE, station(1), station(9), 5)
            .unwrap_err();
        assert!(matches!(
            err,
            SubwayError::InvalidDistance {
                existing: 5,
                requested: 5
            }
        ));
        assert_eq!(sections, abc(), "failed insert leaves sections untouched");
    }

    #[test]
    fn insertion_rejects_known_or_unknown_pairs() {
        let mut sections = abc();
        let err = sections
            .insert(LINE, station(1), station(3), 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = sections
            .insert(LINE, station(7), station(8), 1)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn insertion_into_empty_set_starts_the_chain() -> anyhow::Result<()> {
        let mut sections = Sections::default();
        sections.insert(LINE, station(1), station(2), 10)?;
        assert_eq!(ids(&sections.stations(TraversalPolicy::Strict)?), vec![1, 2]);
        Ok(())
    }

    #[test]
    fn removing_interior_station_merges_sections() -> anyhow::Result<()> {
        let mut sections = abc();
        sections.remove_station(&station(2))?;
        assert_eq!(ids(&sections.stations(TraversalPolicy::Strict)?), vec![1, 3]);
        assert_eq!(sections.iter().next().map(Section::distance), Some(12));
        Ok(())
    }

    #[test]
    fn removing_boundary_stations_drops_sections() -> anyhow::Result<()> {
        let mut sections = abc();
        sections.remove_station(&station(1))?;
        assert_eq!(ids(&sections.stations(TraversalPolicy::Strict)?), vec![2, 3]);

        let mut sections = abc();
        sections.remove_station(&station(3))?;
        assert_eq!(ids(&sections.stations(TraversalPolicy::Strict)?), vec![1, 2]);
        Ok(())
    }

    #[test]
    fn removal_keeps_last_section() {
        let mut sections = Sections::new(vec![section(1, 2, 10)]);
        let err = sections.remove_station(&station(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = abc().remove_station(&station(42)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
