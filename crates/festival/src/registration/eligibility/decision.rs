use serde::{Deserialize, Serialize};

use super::super::domain::{EventCategory, EventId, GroupMode};

/// Outcome of an admission or slot check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Admitted,
    Rejected(RejectionReason),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }

    pub fn reason(&self) -> Option<&RejectionReason> {
        match self {
            Decision::Admitted => None,
            Decision::Rejected(reason) => Some(reason),
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Decision::Admitted => "admitted".to_string(),
            Decision::Rejected(reason) => reason.summary(),
        }
    }
}

/// Why a registration may not proceed. Callers treat every variant the same way
/// (do not write); only the message differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    EventNotFound {
        category: EventCategory,
        event_id: EventId,
    },
    LimitExceeded {
        category: EventCategory,
        mode: GroupMode,
        label: String,
        limit: u32,
    },
    SlotsExhausted {
        event_id: EventId,
        slots: u32,
    },
    /// The stored event carries a group mode from the other category.
    ModeMismatch {
        category: EventCategory,
        event_id: EventId,
        mode: GroupMode,
    },
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::EventNotFound { .. } => "Event not found".to_string(),
            RejectionReason::LimitExceeded {
                category,
                label,
                limit,
                ..
            } => format!(
                "Student has reached maximum limit of {limit} {label} {} events",
                category.label()
            ),
            RejectionReason::SlotsExhausted { slots, .. } => {
                format!("House has used all {slots} slots for this event")
            }
            RejectionReason::ModeMismatch {
                category,
                event_id,
                mode,
            } => format!(
                "Event {event_id} has group mode {}, which does not belong to {} events",
                mode.as_str(),
                category.label()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_message_names_limit_and_category() {
        let reason = RejectionReason::LimitExceeded {
            category: EventCategory::Arts,
            mode: GroupMode::Single,
            label: "single".to_string(),
            limit: 4,
        };
        assert_eq!(
            reason.summary(),
            "Student has reached maximum limit of 4 single arts events"
        );
    }

    #[test]
    fn slot_message_names_slot_count() {
        let decision = Decision::Rejected(RejectionReason::SlotsExhausted {
            event_id: EventId(7),
            slots: 3,
        });
        assert!(!decision.is_admitted());
        assert_eq!(
            decision.summary(),
            "House has used all 3 slots for this event"
        );
    }

    #[test]
    fn admitted_has_no_reason() {
        assert!(Decision::Admitted.reason().is_none());
        assert!(Decision::Admitted.is_admitted());
    }
}
