use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    Actor, DetailRole, Event, EventCategory, EventId, House, HouseId, NewEvent, Registration,
    RegistrationDetail, Student, StudentId, Winner,
};
use super::eligibility::{
    Decision, EligibilityEngine, ParticipationCounts, ParticipationLimits, RejectionReason,
};
use super::leaderboard::{self, HouseStanding};
use super::store::{FestivalStore, NewMember, NewRegistration, NewWinner, StoreError};

/// A captain's request to register students of one house for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub category: EventCategory,
    pub event_id: EventId,
    pub house_id: HouseId,
    pub members: Vec<MemberRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRequest {
    pub student_id: StudentId,
    #[serde(default)]
    pub role: Option<DetailRole>,
}

/// What was written for an accepted registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub registration: Registration,
    pub details: Vec<RegistrationDetail>,
}

/// Everything a captain sees about their own house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseSummary {
    pub house: House,
    pub students: Vec<Student>,
    pub registrations: Vec<HouseRegistrationView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseRegistrationView {
    pub registration: Registration,
    pub event_name: Option<String>,
    pub members: Vec<RegistrationDetail>,
}

/// Service composing the eligibility engine with the store.
///
/// Check-then-insert runs under `admission`, so within one service instance two
/// concurrent registrations cannot both claim the last slot or the last
/// participation. Processes sharing one database need their own serialization.
pub struct RegistrationService<S> {
    store: Arc<S>,
    engine: Arc<EligibilityEngine>,
    admission: Mutex<()>,
}

impl<S> RegistrationService<S>
where
    S: FestivalStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_limits(store, ParticipationLimits::default())
    }

    pub fn with_limits(store: Arc<S>, limits: ParticipationLimits) -> Self {
        Self {
            store,
            engine: Arc::new(EligibilityEngine::new(limits)),
            admission: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn check_arts(
        &self,
        student: StudentId,
        event: EventId,
        role: DetailRole,
    ) -> Result<Decision, RegistrationError> {
        Ok(self
            .engine
            .decide_arts(self.store.as_ref(), student, event, role)?)
    }

    pub fn check_sports(
        &self,
        student: StudentId,
        event: EventId,
    ) -> Result<Decision, RegistrationError> {
        Ok(self
            .engine
            .decide_sports(self.store.as_ref(), student, event)?)
    }

    pub fn check_slots(
        &self,
        house: HouseId,
        event: EventId,
        category: EventCategory,
    ) -> Result<Decision, RegistrationError> {
        Ok(self
            .engine
            .check_house_slots(self.store.as_ref(), house, event, category)?)
    }

    /// Participation counters of a known student.
    pub fn participation(
        &self,
        student: StudentId,
    ) -> Result<ParticipationCounts, RegistrationError> {
        if self.store.student(student)?.is_none() {
            return Err(RegistrationError::Store(StoreError::NotFound));
        }
        Ok(self
            .engine
            .count_participation(self.store.as_ref(), student)?)
    }

    /// Validate, check limits, and write a registration with its details.
    ///
    /// Nothing is written unless every check passes.
    pub fn register(
        &self,
        actor: &Actor,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        if !actor.may_act_for(request.house_id) {
            warn!(house = %request.house_id, "registration attempted for another house");
            return Err(RegistrationError::Forbidden);
        }

        let _admission = self
            .admission
            .lock()
            .map_err(|_| StoreError::Unavailable("admission lock poisoned".to_string()))?;

        let category = request.category;
        let Some(event) = self.store.event(category, request.event_id)? else {
            return Err(RegistrationError::Rejected {
                student_id: None,
                reason: RejectionReason::EventNotFound {
                    category,
                    event_id: request.event_id,
                },
            });
        };

        let members = self.normalize_members(&event, &request)?;

        match self.engine.check_house_slots(
            self.store.as_ref(),
            request.house_id,
            event.id,
            category,
        )? {
            Decision::Admitted => {}
            Decision::Rejected(reason) => {
                return Err(RegistrationError::Rejected {
                    student_id: None,
                    reason,
                })
            }
        }

        for member in &members {
            let decision = self.engine.decide(
                self.store.as_ref(),
                category,
                member.student_id,
                event.id,
                member.role,
            )?;
            if let Decision::Rejected(reason) = decision {
                return Err(RegistrationError::Rejected {
                    student_id: Some(member.student_id),
                    reason,
                });
            }
        }

        let (registration, details) = self.store.insert_registration(NewRegistration {
            category,
            event_id: event.id,
            house_id: request.house_id,
            members,
        })?;

        info!(
            registration = %registration.id,
            house = %registration.house_id,
            event = %event.name,
            members = details.len(),
            "registration created"
        );

        Ok(RegistrationReceipt {
            registration,
            details,
        })
    }

    fn normalize_members(
        &self,
        event: &Event,
        request: &RegistrationRequest,
    ) -> Result<Vec<NewMember>, RegistrationError> {
        if request.members.is_empty() {
            return Err(invalid("registration needs at least one student"));
        }

        let mut seen = HashSet::new();
        let mut participants = 0u32;
        let mut accompanists = 0u32;
        let mut members = Vec::with_capacity(request.members.len());

        for member in &request.members {
            if !seen.insert(member.student_id) {
                return Err(invalid(format!(
                    "student {} is listed more than once",
                    member.student_id
                )));
            }

            let role = match (event.category, member.role) {
                (EventCategory::Arts, None) => {
                    return Err(invalid(format!(
                        "student {} needs a role for arts events",
                        member.student_id
                    )))
                }
                (EventCategory::Arts, Some(role)) => Some(role),
                (EventCategory::Sports, Some(DetailRole::Accompanist)) => {
                    return Err(invalid("sports events do not take accompanists"))
                }
                (EventCategory::Sports, _) => None,
            };

            match role {
                Some(DetailRole::Accompanist) => accompanists += 1,
                _ => participants += 1,
            }

            let student = self.store.student(member.student_id)?.ok_or_else(|| {
                invalid(format!("student {} does not exist", member.student_id))
            })?;
            if student.house_id != request.house_id {
                return Err(invalid(format!(
                    "student {} belongs to another house",
                    member.student_id
                )));
            }

            members.push(NewMember {
                student_id: member.student_id,
                role,
            });
        }

        if participants == 0 {
            return Err(invalid("registration needs at least one participant"));
        }
        if participants > event.max_participants {
            return Err(invalid(format!(
                "{} allows at most {} participants",
                event.name, event.max_participants
            )));
        }
        if accompanists > event.max_accompanists {
            return Err(invalid(format!(
                "{} allows at most {} accompanists",
                event.name, event.max_accompanists
            )));
        }

        Ok(members)
    }

    /// Admin-only event creation.
    pub fn create_event(&self, actor: &Actor, event: NewEvent) -> Result<Event, RegistrationError> {
        if !actor.is_admin() {
            return Err(RegistrationError::Forbidden);
        }
        event.validate().map_err(RegistrationError::Invalid)?;
        let event = self.store.insert_event(event)?;
        info!(event = %event.id, category = %event.category, name = %event.name, "event created");
        Ok(event)
    }

    /// Admin-only placement of a registration in an event's top three.
    pub fn record_winner(
        &self,
        actor: &Actor,
        winner: NewWinner,
    ) -> Result<Winner, RegistrationError> {
        if !actor.is_admin() {
            return Err(RegistrationError::Forbidden);
        }

        let registration = self
            .store
            .registration(winner.category, winner.registration_id)?
            .ok_or_else(|| invalid(format!("registration {} does not exist", winner.registration_id)))?;
        if registration.event_id != winner.event_id {
            return Err(invalid(format!(
                "registration {} is not for event {}",
                registration.id, winner.event_id
            )));
        }

        let stored = self.store.insert_winner(winner)?;
        info!(
            event = %stored.event_id,
            registration = %stored.registration_id,
            position = u8::from(stored.position),
            "winner recorded"
        );
        Ok(stored)
    }

    pub fn house_summary(
        &self,
        actor: &Actor,
        house_id: HouseId,
    ) -> Result<HouseSummary, RegistrationError> {
        if !actor.may_act_for(house_id) {
            return Err(RegistrationError::Forbidden);
        }
        let house = self.store.house(house_id)?.ok_or(StoreError::NotFound)?;
        let students = self.store.students_in_house(house_id)?;

        let mut registrations = Vec::new();
        for registration in self.store.registrations_for_house(house_id)? {
            let event_name = self
                .store
                .event(registration.category, registration.event_id)?
                .map(|event| event.name);
            let members = self
                .store
                .details(registration.category, registration.id)?;
            registrations.push(HouseRegistrationView {
                registration,
                event_name,
                members,
            });
        }

        Ok(HouseSummary {
            house,
            students,
            registrations,
        })
    }

    pub fn leaderboard(&self) -> Result<Vec<HouseStanding>, RegistrationError> {
        Ok(leaderboard::standings(self.store.as_ref())?)
    }
}

fn invalid(message: impl Into<String>) -> RegistrationError {
    RegistrationError::Invalid(message.into())
}

/// Error raised by the registration service.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("actor is not allowed to perform this action")]
    Forbidden,
    #[error("registration rejected: {}", .reason.summary())]
    Rejected {
        student_id: Option<StudentId>,
        reason: RejectionReason,
    },
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistrationError::Forbidden => StatusCode::FORBIDDEN,
            RegistrationError::Rejected { .. } => StatusCode::CONFLICT,
            RegistrationError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RegistrationError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            RegistrationError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
            RegistrationError::Store(StoreError::Unavailable(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
