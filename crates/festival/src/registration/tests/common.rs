use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::registration::domain::{
    DetailRole, Event, EventCategory, EventId, GroupMode, House, HouseId, NewEvent, PointTable,
    Registration, Student, StudentId,
};
use crate::registration::store::{
    EligibilityStore, FestivalStore, MemoryFestivalStore, NewMember, NewRegistration, NewStudent,
    ParticipationRow, StoreError,
};
use crate::registration::{registration_router, EligibilityEngine, RegistrationService};

pub(super) struct Fixture {
    pub(super) store: Arc<MemoryFestivalStore>,
    pub(super) service: RegistrationService<MemoryFestivalStore>,
    pub(super) house: House,
    pub(super) rival: House,
    pub(super) students: Vec<Student>,
    pub(super) rival_student: Student,
}

pub(super) fn fixture() -> Fixture {
    let store = Arc::new(MemoryFestivalStore::new());
    let house = store.insert_house("Agni").expect("house");
    let rival = store.insert_house("Vayu").expect("rival house");

    let students = ["Asha", "Bilal", "Chitra", "Dev"]
        .into_iter()
        .map(|name| {
            store
                .insert_student(NewStudent {
                    name: name.to_string(),
                    class: Some("BA".to_string()),
                    year: Some(1),
                    house_id: house.id,
                })
                .expect("student")
        })
        .collect();
    let rival_student = store
        .insert_student(NewStudent {
            name: "Esha".to_string(),
            class: None,
            year: None,
            house_id: rival.id,
        })
        .expect("rival student");

    let service = RegistrationService::new(store.clone());
    Fixture {
        store,
        service,
        house,
        rival,
        students,
        rival_student,
    }
}

pub(super) fn engine() -> EligibilityEngine {
    EligibilityEngine::default()
}

pub(super) fn points() -> PointTable {
    PointTable {
        first: 10,
        second: 6,
        third: 3,
    }
}

pub(super) fn new_event(mode: GroupMode, slots: u32) -> NewEvent {
    let category = mode.category();
    NewEvent {
        category,
        name: format!("{} event", mode.as_str()),
        group_mode: mode,
        slots_per_house: slots,
        max_participants: 6,
        max_accompanists: if category == EventCategory::Arts { 2 } else { 0 },
        points: points(),
    }
}

pub(super) fn event(store: &MemoryFestivalStore, mode: GroupMode, slots: u32) -> Event {
    store.insert_event(new_event(mode, slots)).expect("event")
}

/// Writes a registration straight to the store, bypassing every check.
pub(super) fn seed(
    store: &MemoryFestivalStore,
    event: &Event,
    house: HouseId,
    student: StudentId,
    role: Option<DetailRole>,
) -> Registration {
    let (registration, _) = store
        .insert_registration(NewRegistration {
            category: event.category,
            event_id: event.id,
            house_id: house,
            members: vec![NewMember {
                student_id: student,
                role,
            }],
        })
        .expect("seeded registration");
    registration
}

/// Seeds `count` participations of `student` in fresh events of `mode`.
pub(super) fn seed_participations(
    store: &MemoryFestivalStore,
    mode: GroupMode,
    house: HouseId,
    student: StudentId,
    count: usize,
) {
    let role = match mode.category() {
        EventCategory::Arts => Some(DetailRole::Participant),
        EventCategory::Sports => None,
    };
    for _ in 0..count {
        let event = event(store, mode, 5);
        seed(store, &event, house, student, role);
    }
}

pub(super) struct UnavailableStore;

impl EligibilityStore for UnavailableStore {
    fn event(&self, _category: EventCategory, _id: EventId) -> Result<Option<Event>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn participations(
        &self,
        _category: EventCategory,
        _student: StudentId,
    ) -> Result<Vec<ParticipationRow>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn count_registrations(
        &self,
        _category: EventCategory,
        _house: HouseId,
        _event: EventId,
    ) -> Result<u32, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn router(fixture: Fixture) -> axum::Router {
    registration_router(Arc::new(fixture.service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
