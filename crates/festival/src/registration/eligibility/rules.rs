use serde::{Deserialize, Serialize};

use super::super::domain::{EventCategory, GroupMode};
use super::super::store::ParticipationRow;

pub const ARTS_SINGLE_LIMIT: u32 = 4;
pub const ARTS_GROUP_LIMIT: u32 = 2;
pub const SPORTS_INDIVIDUAL_LIMIT: u32 = 3;
pub const SPORTS_TEAM_LIMIT: u32 = 2;

/// Participation ceiling for one group mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeLimit {
    pub mode: GroupMode,
    /// Word used in rejection messages, e.g. "single" or "team".
    pub label: &'static str,
    pub limit: u32,
}

/// Descriptor for one category: its two group modes and whether details carry a role.
///
/// Arts and sports share the same decision path; only this descriptor differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryRules {
    pub category: EventCategory,
    pub primary: ModeLimit,
    pub secondary: ModeLimit,
    pub has_role_field: bool,
}

impl CategoryRules {
    pub const fn arts() -> Self {
        Self {
            category: EventCategory::Arts,
            primary: ModeLimit {
                mode: GroupMode::Single,
                label: "single",
                limit: ARTS_SINGLE_LIMIT,
            },
            secondary: ModeLimit {
                mode: GroupMode::Group,
                label: "group",
                limit: ARTS_GROUP_LIMIT,
            },
            has_role_field: true,
        }
    }

    pub const fn sports() -> Self {
        Self {
            category: EventCategory::Sports,
            primary: ModeLimit {
                mode: GroupMode::Individual,
                label: "individual",
                limit: SPORTS_INDIVIDUAL_LIMIT,
            },
            secondary: ModeLimit {
                mode: GroupMode::Team,
                label: "team",
                limit: SPORTS_TEAM_LIMIT,
            },
            has_role_field: false,
        }
    }

    pub fn limit_for(&self, mode: GroupMode) -> Option<&ModeLimit> {
        if self.primary.mode == mode {
            Some(&self.primary)
        } else if self.secondary.mode == mode {
            Some(&self.secondary)
        } else {
            None
        }
    }
}

/// Both category descriptors used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipationLimits {
    pub arts: CategoryRules,
    pub sports: CategoryRules,
}

impl ParticipationLimits {
    pub fn rules(&self, category: EventCategory) -> &CategoryRules {
        match category {
            EventCategory::Arts => &self.arts,
            EventCategory::Sports => &self.sports,
        }
    }
}

impl Default for ParticipationLimits {
    fn default() -> Self {
        Self {
            arts: CategoryRules::arts(),
            sports: CategoryRules::sports(),
        }
    }
}

/// Participations (never accompaniments) of one student per group mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationCounts {
    pub arts_single: u32,
    pub arts_group: u32,
    pub sports_individual: u32,
    pub sports_team: u32,
}

impl ParticipationCounts {
    pub fn get(&self, mode: GroupMode) -> u32 {
        match mode {
            GroupMode::Single => self.arts_single,
            GroupMode::Group => self.arts_group,
            GroupMode::Individual => self.sports_individual,
            GroupMode::Team => self.sports_team,
        }
    }

    fn slot_mut(&mut self, mode: GroupMode) -> &mut u32 {
        match mode {
            GroupMode::Single => &mut self.arts_single,
            GroupMode::Group => &mut self.arts_group,
            GroupMode::Individual => &mut self.sports_individual,
            GroupMode::Team => &mut self.sports_team,
        }
    }

    pub fn total(&self) -> u32 {
        self.arts_single + self.arts_group + self.sports_individual + self.sports_team
    }
}

/// Folds participation rows of one category into counters. Rows whose mode
/// belongs to neither of the category's modes are ignored.
pub(crate) fn tally(
    rules: &CategoryRules,
    rows: &[ParticipationRow],
    counts: &mut ParticipationCounts,
) {
    for row in rows {
        if rules.limit_for(row.group_mode).is_some() {
            *counts.slot_mut(row.group_mode) += 1;
        }
    }
}
