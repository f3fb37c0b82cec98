//! Participation limits and house slot capacity.
//!
//! The engine only reads. Every call is a single read-then-decide cycle over
//! whatever the store returns at call time, so two concurrent callers can both
//! see room for one more registration. Callers that need hard limits must run
//! the check and the insert under one lock or transaction; the registration
//! service does this with its admission lock.

mod decision;
mod rules;

pub use decision::{Decision, RejectionReason};
pub use rules::{
    CategoryRules, ModeLimit, ParticipationCounts, ParticipationLimits, ARTS_GROUP_LIMIT,
    ARTS_SINGLE_LIMIT, SPORTS_INDIVIDUAL_LIMIT, SPORTS_TEAM_LIMIT,
};

use tracing::{debug, info};

use super::domain::{DetailRole, EventCategory, EventId, HouseId, StudentId};
use super::store::{EligibilityStore, StoreError};

/// Stateless evaluator that applies the participation limits to stored data.
#[derive(Debug, Clone, Default)]
pub struct EligibilityEngine {
    limits: ParticipationLimits,
}

impl EligibilityEngine {
    pub fn new(limits: ParticipationLimits) -> Self {
        Self { limits }
    }

    /// Counts the student's participations in both categories.
    pub fn count_participation<S>(
        &self,
        store: &S,
        student: StudentId,
    ) -> Result<ParticipationCounts, StoreError>
    where
        S: EligibilityStore + ?Sized,
    {
        let mut counts = ParticipationCounts::default();
        for rules in [&self.limits.arts, &self.limits.sports] {
            let rows = store.participations(rules.category, student)?;
            rules::tally(rules, &rows, &mut counts);
        }
        Ok(counts)
    }

    pub fn decide_arts<S>(
        &self,
        store: &S,
        student: StudentId,
        event: EventId,
        role: DetailRole,
    ) -> Result<Decision, StoreError>
    where
        S: EligibilityStore + ?Sized,
    {
        self.decide(store, EventCategory::Arts, student, event, Some(role))
    }

    pub fn decide_sports<S>(
        &self,
        store: &S,
        student: StudentId,
        event: EventId,
    ) -> Result<Decision, StoreError>
    where
        S: EligibilityStore + ?Sized,
    {
        self.decide(store, EventCategory::Sports, student, event, None)
    }

    /// Decides whether `student` may take part in `event`.
    ///
    /// Accompanists are admitted without consulting the store in categories
    /// whose details carry a role. In categories without one the role is ignored.
    pub fn decide<S>(
        &self,
        store: &S,
        category: EventCategory,
        student: StudentId,
        event_id: EventId,
        role: Option<DetailRole>,
    ) -> Result<Decision, StoreError>
    where
        S: EligibilityStore + ?Sized,
    {
        let rules = self.limits.rules(category);

        if rules.has_role_field && role == Some(DetailRole::Accompanist) {
            debug!(%category, %student, %event_id, "accompanist admitted without limit check");
            return Ok(Decision::Admitted);
        }

        let Some(event) = store.event(category, event_id)? else {
            return Ok(reject(
                student,
                RejectionReason::EventNotFound { category, event_id },
            ));
        };

        let Some(mode_limit) = rules.limit_for(event.group_mode) else {
            return Ok(reject(
                student,
                RejectionReason::ModeMismatch {
                    category,
                    event_id,
                    mode: event.group_mode,
                },
            ));
        };

        let rows = store.participations(category, student)?;
        let mut counts = ParticipationCounts::default();
        rules::tally(rules, &rows, &mut counts);
        let current = counts.get(mode_limit.mode);

        if current >= mode_limit.limit {
            return Ok(reject(
                student,
                RejectionReason::LimitExceeded {
                    category,
                    mode: mode_limit.mode,
                    label: mode_limit.label.to_string(),
                    limit: mode_limit.limit,
                },
            ));
        }

        debug!(
            %category,
            %student,
            %event_id,
            current,
            limit = mode_limit.limit,
            "participation admitted"
        );
        Ok(Decision::Admitted)
    }

    /// Checks whether `house` may create another registration for `event_id`.
    pub fn check_house_slots<S>(
        &self,
        store: &S,
        house: HouseId,
        event_id: EventId,
        category: EventCategory,
    ) -> Result<Decision, StoreError>
    where
        S: EligibilityStore + ?Sized,
    {
        let Some(event) = store.event(category, event_id)? else {
            info!(%house, %category, %event_id, "slot check for unknown event");
            return Ok(Decision::Rejected(RejectionReason::EventNotFound {
                category,
                event_id,
            }));
        };

        let used = store.count_registrations(category, house, event_id)?;
        if used >= event.slots_per_house {
            info!(%house, %event_id, used, slots = event.slots_per_house, "house slots exhausted");
            return Ok(Decision::Rejected(RejectionReason::SlotsExhausted {
                event_id,
                slots: event.slots_per_house,
            }));
        }

        debug!(%house, %event_id, used, slots = event.slots_per_house, "house slot available");
        Ok(Decision::Admitted)
    }
}

fn reject(student: StudentId, reason: RejectionReason) -> Decision {
    info!(%student, reason = %reason.summary(), "participation rejected");
    Decision::Rejected(reason)
}
