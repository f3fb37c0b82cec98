//! House registrations for festival events: who may register, for what, and
//! how the results add up.

pub mod domain;
pub mod eligibility;
pub mod leaderboard;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, DetailRole, Event, EventCategory, EventId, GroupMode, House, HouseId, NewEvent,
    PointTable, Position, Registration, RegistrationDetail, RegistrationId, Student, StudentId,
    UserRole, Winner,
};
pub use eligibility::{
    CategoryRules, Decision, EligibilityEngine, ParticipationCounts, ParticipationLimits,
    RejectionReason,
};
pub use leaderboard::HouseStanding;
pub use router::{registration_router, EligibilityView, SlotView, HOUSE_HEADER, ROLE_HEADER};
pub use service::{
    HouseSummary, MemberRequest, RegistrationError, RegistrationReceipt, RegistrationRequest,
    RegistrationService,
};
pub use store::{
    EligibilityStore, FestivalStore, MemoryFestivalStore, NewMember, NewRegistration, NewStudent,
    NewWinner, ParticipationRow, SqliteFestivalStore, StoreError,
};
