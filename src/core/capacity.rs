//! Read-only view over stations, sections, recipes and pinning rules

use crate::core::config::PinScope;
use crate::core::errors::Result;
use crate::core::model::{AssignmentConstraint, Section, TaskDefinition};
use crate::core::store::KitchenRepository;
use crate::core::types::{MenuItemId, SectionId, StationId};

/// Capacity model borrowed from a repository snapshot
pub struct CapacityModel<'a, R: KitchenRepository + ?Sized> {
    repo: &'a R,
    pin_scope: PinScope,
}

impl<'a, R: KitchenRepository + ?Sized> CapacityModel<'a, R> {
    /// Create a new capacity model over the given repository
    pub fn new(repo: &'a R) -> Self {
        Self {
            repo,
            pin_scope: PinScope::default(),
        }
    }

    pub fn with_pin_scope(mut self, pin_scope: PinScope) -> Self {
        self.pin_scope = pin_scope;
        self
    }

    /// Sections of a station in section-id order
    pub fn sections_for(&self, station_id: StationId) -> Result<Vec<&'a Section>> {
        require!(self.repo.station(station_id), Station, station_id);
        Ok(self.repo.sections_of(station_id))
    }

    /// Sum of the concurrent-task limits of a station's sections
    pub fn total_capacity(&self, station_id: StationId) -> Result<u32> {
        Ok(self
            .sections_for(station_id)?
            .iter()
            .map(|s| s.max_concurrent_tasks)
            .sum())
    }

    /// Section a menu item is pinned to, if any
    ///
    /// The constraint with the highest priority wins; equal priorities fall
    /// back to the lowest constraint id.
    pub fn pinned_section(&self, menu_item_id: MenuItemId) -> Result<Option<&'a Section>> {
        require!(self.repo.menu_item(menu_item_id), MenuItem, menu_item_id);
        let constraints = self.repo.constraints_for(menu_item_id);
        self.strongest(constraints.into_iter())
    }

    /// Pinned section of a menu item restricted to one station
    ///
    /// A pin only governs the item's tasks that run on the pinned section's
    /// station.
    pub fn pinned_section_on(&self, menu_item_id: MenuItemId, station_id: StationId) -> Result<Option<&'a Section>> {
        let repo = self.repo;
        let constraints = repo
            .constraints_for(menu_item_id)
            .into_iter()
            .filter(move |c| repo.section(c.section_id).map(|s| s.station_id) == Some(station_id));
        self.strongest(constraints)
    }

    /// Recipe of a menu item ordered by rank
    pub fn recipe(&self, menu_item_id: MenuItemId) -> Result<Vec<&'a TaskDefinition>> {
        require!(self.repo.menu_item(menu_item_id), MenuItem, menu_item_id);
        Ok(self.repo.recipe_of(menu_item_id))
    }

    /// Candidate sections for a task definition, in the order they are tried
    ///
    /// A pin yields its section alone. Otherwise the preferred section comes
    /// first, followed by the rest of the station in id order.
    pub fn candidates(&self, definition: &TaskDefinition) -> Result<Candidates<'a>> {
        let pinned = match self.pin_scope {
            PinScope::MenuItem => self.pinned_section(definition.menu_item_id)?,
            PinScope::Station => self.pinned_section_on(definition.menu_item_id, definition.station_id)?,
        };
        if let Some(pinned) = pinned {
            return Ok(Candidates {
                sections: vec![pinned],
                pinned: true,
            });
        }

        let mut sections = self.sections_for(definition.station_id)?;
        if let Some(preferred) = definition.preferred_section_id {
            if let Some(pos) = sections.iter().position(|s| s.id == preferred) {
                let section = sections.remove(pos);
                sections.insert(0, section);
            }
        }
        Ok(Candidates {
            sections,
            pinned: false,
        })
    }

    /// In-progress count and capacity of a section
    pub fn load_of(&self, section_id: SectionId) -> Result<(usize, u32)> {
        let section = require!(self.repo.section(section_id), Section, section_id);
        Ok((self.repo.in_progress_on(section_id), section.max_concurrent_tasks))
    }

    fn strongest<I>(&self, constraints: I) -> Result<Option<&'a Section>>
    where
        I: Iterator<Item = &'a AssignmentConstraint>,
    {
        let best = constraints.min_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        match best {
            Some(constraint) => Ok(Some(require!(
                self.repo.section(constraint.section_id),
                Section,
                constraint.section_id
            ))),
            None => Ok(None),
        }
    }
}

/// Ordered candidate sections for one task
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    pub sections: Vec<&'a Section>,
    /// Whether the list comes from an assignment constraint
    pub pinned: bool,
}
