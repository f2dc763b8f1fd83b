use super::{LineId, Section, Station};
use crate::{
    error::{Result, SubwayError},
    topology::{SectionDiff, Sections, TraversalPolicy},
};

/// A named, coloured line and the sections it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Store-assigned identifier.
    pub id: LineId,
    /// Unique display name.
    pub name: String,
    /// Display colour, e.g. `bg-red-600`.
    pub color: String,
    sections: Sections,
}

impl Line {
    /// A line without sections.
    pub fn new(id: LineId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            sections: Sections::default(),
        }
    }

    /// A line populated with stored sections, each of which must belong to it.
    pub fn with_sections(
        id: LineId,
        name: impl Into<String>,
        color: impl Into<String>,
        sections: impl IntoIterator<Item = Section>,
    ) -> Result<Self> {
        let mut line = Self::new(id, name, color);
        for section in sections {
            line.register(section)?;
        }
        Ok(line)
    }

    /// Attach an already-built section.
    pub fn register(&mut self, section: Section) -> Result<()> {
        if section.line_id() != self.id {
            return Err(SubwayError::invalid(format!(
                "section {section} belongs to line {}, not {}",
                section.line_id(),
                self.id
            )));
        }
        self.sections.push(section);
        Ok(())
    }

    /// The line's sections in storage order.
    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    /// Stations from head to tail.
    pub fn stations(&self, policy: TraversalPolicy) -> Result<Vec<Station>> {
        self.sections.stations(policy)
    }

    /// Insert a section and return the rows storage must rewrite.
    pub fn add_section(
        &mut self,
        up_station: Station,
        down_station: Station,
        distance: u32,
    ) -> Result<SectionDiff> {
        let before = self.sections.clone();
        self.sections
            .insert(self.id, up_station, down_station, distance)?;
        Ok(before.changed_sections(&self.sections))
    }

    /// Remove a station and return the rows storage must rewrite.
    pub fn remove_station(&mut self, station: &Station) -> Result<SectionDiff> {
        let before = self.sections.clone();
        self.sections.remove_station(station)?;
        Ok(before.changed_sections(&self.sections))
    }
}
