use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a house (team).
    HouseId
);
record_id!(
    /// Identifier of a student on a house roster.
    StudentId
);
record_id!(
    /// Identifier of an event, unique within its category.
    EventId
);
record_id!(
    /// Identifier of a house's claim on one event slot.
    RegistrationId
);
record_id!(DetailId);
record_id!(WinnerId);

/// The two festival tracks. Event ids are scoped per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Arts,
    Sports,
}

impl EventCategory {
    pub fn label(&self) -> &'static str {
        match self {
            EventCategory::Arts => "arts",
            EventCategory::Sports => "sports",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "arts" => Some(Self::Arts),
            "sports" => Some(Self::Sports),
            _ => None,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How many students compete together in an event.
///
/// `Single`/`Group` are the Arts vocabulary, `Individual`/`Team` the Sports one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupMode {
    Single,
    Group,
    Individual,
    Team,
}

impl GroupMode {
    pub fn category(&self) -> EventCategory {
        match self {
            GroupMode::Single | GroupMode::Group => EventCategory::Arts,
            GroupMode::Individual | GroupMode::Team => EventCategory::Sports,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupMode::Single => "Single",
            GroupMode::Group => "Group",
            GroupMode::Individual => "Individual",
            GroupMode::Team => "Team",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Single" => Some(Self::Single),
            "Group" => Some(Self::Group),
            "Individual" => Some(Self::Individual),
            "Team" => Some(Self::Team),
            _ => None,
        }
    }
}

/// Role of a student inside a registration. Sports details are always participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailRole {
    Participant,
    Accompanist,
}

impl DetailRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailRole::Participant => "participant",
            DetailRole::Accompanist => "accompanist",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "participant" => Some(Self::Participant),
            "accompanist" => Some(Self::Accompanist),
            _ => None,
        }
    }
}

/// Points paid out for the top three placements of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointTable {
    pub first: u32,
    pub second: u32,
    pub third: u32,
}

impl PointTable {
    pub fn for_position(&self, position: Position) -> u32 {
        match position {
            Position::First => self.first,
            Position::Second => self.second,
            Position::Third => self.third,
        }
    }
}

/// Winner placement, shared by both categories. Serialized as `1`, `2` or `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Position {
    First,
    Second,
    Third,
}

impl TryFrom<u8> for Position {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            3 => Ok(Self::Third),
            other => Err(format!("position must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Position> for u8 {
    fn from(value: Position) -> Self {
        match value {
            Position::First => 1,
            Position::Second => 2,
            Position::Third => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub class: Option<String>,
    pub year: Option<u8>,
    pub house_id: HouseId,
}

/// A festival competition in either category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub category: EventCategory,
    pub name: String,
    pub group_mode: GroupMode,
    pub slots_per_house: u32,
    pub max_participants: u32,
    pub max_accompanists: u32,
    pub points: PointTable,
    pub created_at: DateTime<Utc>,
}

/// Admin input for a new event; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub category: EventCategory,
    pub name: String,
    pub group_mode: GroupMode,
    pub slots_per_house: u32,
    pub max_participants: u32,
    #[serde(default)]
    pub max_accompanists: u32,
    pub points: PointTable,
}

impl NewEvent {
    /// Checks the event invariants, returning the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("event name must not be empty".to_string());
        }
        if self.group_mode.category() != self.category {
            return Err(format!(
                "group mode {} is not valid for {} events",
                self.group_mode.as_str(),
                self.category
            ));
        }
        if self.slots_per_house == 0 {
            return Err("slots_per_house must be at least 1".to_string());
        }
        if self.max_participants == 0 {
            return Err("max_participants must be at least 1".to_string());
        }
        if self.category == EventCategory::Sports && self.max_accompanists > 0 {
            return Err("sports events do not take accompanists".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub category: EventCategory,
    pub event_id: EventId,
    pub house_id: HouseId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetail {
    pub id: DetailId,
    pub category: EventCategory,
    pub registration_id: RegistrationId,
    pub student_id: StudentId,
    /// Always `None` for sports details.
    pub role: Option<DetailRole>,
    pub created_at: DateTime<Utc>,
}

impl RegistrationDetail {
    pub fn counts_as_participation(&self) -> bool {
        !matches!(self.role, Some(DetailRole::Accompanist))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub id: WinnerId,
    pub category: EventCategory,
    pub event_id: EventId,
    pub registration_id: RegistrationId,
    pub position: Position,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    User,
    Admin,
}

/// Capability of whoever is invoking a mutating action.
///
/// Authentication happens upstream; the service only trusts what it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: UserRole,
    pub house_id: Option<HouseId>,
}

impl Actor {
    pub fn admin() -> Self {
        Self {
            role: UserRole::Admin,
            house_id: None,
        }
    }

    pub fn captain(house_id: HouseId) -> Self {
        Self {
            role: UserRole::User,
            house_id: Some(house_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins act for every house; captains only for their own.
    pub fn may_act_for(&self, house_id: HouseId) -> bool {
        self.is_admin() || self.house_id == Some(house_id)
    }
}
