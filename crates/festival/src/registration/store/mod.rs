//! Storage seams for registrations.
//!
//! [`EligibilityStore`] is the narrow read interface the eligibility engine decides
//! against. [`FestivalStore`] layers the CRUD the registration workflows need on top.

mod memory;
mod sqlite;

pub use memory::MemoryFestivalStore;
pub use sqlite::SqliteFestivalStore;

use serde::{Deserialize, Serialize};

use super::domain::{
    DetailRole, Event, EventCategory, EventId, GroupMode, House, HouseId, NewEvent, Position,
    Registration, RegistrationDetail, RegistrationId, Student, StudentId, Winner,
};

/// One participant detail flattened through its registration and event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationRow {
    pub house_id: HouseId,
    pub group_mode: GroupMode,
}

/// Reads the eligibility engine depends on. Implementations must answer from a
/// consistent view at call time; counts must be exact.
pub trait EligibilityStore: Send + Sync {
    fn event(&self, category: EventCategory, id: EventId) -> Result<Option<Event>, StoreError>;

    /// Participations of `student` in `category`: arts details with the
    /// participant role, and every sports detail. Details whose registration or
    /// event no longer resolves are skipped.
    fn participations(
        &self,
        category: EventCategory,
        student: StudentId,
    ) -> Result<Vec<ParticipationRow>, StoreError>;

    fn count_registrations(
        &self,
        category: EventCategory,
        house: HouseId,
        event: EventId,
    ) -> Result<u32, StoreError>;
}

/// Student assignment inside a registration that has not been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub student_id: StudentId,
    pub role: Option<DetailRole>,
}

/// A registration plus its details, written together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    pub category: EventCategory,
    pub event_id: EventId,
    pub house_id: HouseId,
    pub members: Vec<NewMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub class: Option<String>,
    pub year: Option<u8>,
    pub house_id: HouseId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWinner {
    pub category: EventCategory,
    pub event_id: EventId,
    pub registration_id: RegistrationId,
    pub position: Position,
}

/// Full storage abstraction so the service can be exercised against memory or SQLite.
pub trait FestivalStore: EligibilityStore {
    fn insert_house(&self, name: &str) -> Result<House, StoreError>;
    fn houses(&self) -> Result<Vec<House>, StoreError>;
    fn house(&self, id: HouseId) -> Result<Option<House>, StoreError>;

    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError>;
    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError>;
    fn students_in_house(&self, house: HouseId) -> Result<Vec<Student>, StoreError>;

    fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError>;
    fn events(&self, category: EventCategory) -> Result<Vec<Event>, StoreError>;

    /// Writes the registration and all of its details, or nothing.
    fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> Result<(Registration, Vec<RegistrationDetail>), StoreError>;
    fn registration(
        &self,
        category: EventCategory,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError>;
    fn registrations_for_house(&self, house: HouseId) -> Result<Vec<Registration>, StoreError>;
    fn details(
        &self,
        category: EventCategory,
        registration: RegistrationId,
    ) -> Result<Vec<RegistrationDetail>, StoreError>;

    fn insert_winner(&self, winner: NewWinner) -> Result<Winner, StoreError>;
    fn winners(&self, category: EventCategory) -> Result<Vec<Winner>, StoreError>;
}

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
