use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::{
    EligibilityStore, FestivalStore, NewRegistration, NewStudent, NewWinner, ParticipationRow,
    StoreError,
};
use crate::registration::domain::{
    DetailId, Event, EventCategory, EventId, House, HouseId, NewEvent, Registration,
    RegistrationDetail, RegistrationId, Student, StudentId, Winner, WinnerId,
};

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    houses: Vec<House>,
    students: Vec<Student>,
    events: Vec<Event>,
    registrations: Vec<Registration>,
    details: Vec<RegistrationDetail>,
    winners: Vec<Winner>,
}

impl MemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mutex-guarded in-process store. Every call sees a consistent snapshot.
#[derive(Debug, Default)]
pub struct MemoryFestivalStore {
    state: Mutex<MemoryState>,
}

impl MemoryFestivalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }
}

impl EligibilityStore for MemoryFestivalStore {
    fn event(&self, category: EventCategory, id: EventId) -> Result<Option<Event>, StoreError> {
        let state = self.state()?;
        Ok(state
            .events
            .iter()
            .find(|event| event.category == category && event.id == id)
            .cloned())
    }

    fn participations(
        &self,
        category: EventCategory,
        student: StudentId,
    ) -> Result<Vec<ParticipationRow>, StoreError> {
        let state = self.state()?;
        let rows = state
            .details
            .iter()
            .filter(|detail| {
                detail.category == category
                    && detail.student_id == student
                    && detail.counts_as_participation()
            })
            .filter_map(|detail| {
                let registration = state.registrations.iter().find(|registration| {
                    registration.category == category && registration.id == detail.registration_id
                })?;
                let event = state.events.iter().find(|event| {
                    event.category == category && event.id == registration.event_id
                })?;
                Some(ParticipationRow {
                    house_id: registration.house_id,
                    group_mode: event.group_mode,
                })
            })
            .collect();
        Ok(rows)
    }

    fn count_registrations(
        &self,
        category: EventCategory,
        house: HouseId,
        event: EventId,
    ) -> Result<u32, StoreError> {
        let state = self.state()?;
        let count = state
            .registrations
            .iter()
            .filter(|registration| {
                registration.category == category
                    && registration.house_id == house
                    && registration.event_id == event
            })
            .count();
        u32::try_from(count).map_err(|_| StoreError::Unavailable("count overflow".to_string()))
    }
}

impl FestivalStore for MemoryFestivalStore {
    fn insert_house(&self, name: &str) -> Result<House, StoreError> {
        let mut state = self.state()?;
        if state.houses.iter().any(|house| house.name == name) {
            return Err(StoreError::Conflict);
        }
        let house = House {
            id: HouseId(state.allocate()),
            name: name.to_string(),
        };
        state.houses.push(house.clone());
        Ok(house)
    }

    fn houses(&self) -> Result<Vec<House>, StoreError> {
        let state = self.state()?;
        let mut houses = state.houses.clone();
        houses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(houses)
    }

    fn house(&self, id: HouseId) -> Result<Option<House>, StoreError> {
        let state = self.state()?;
        Ok(state.houses.iter().find(|house| house.id == id).cloned())
    }

    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError> {
        let mut state = self.state()?;
        if !state.houses.iter().any(|house| house.id == student.house_id) {
            return Err(StoreError::NotFound);
        }
        let student = Student {
            id: StudentId(state.allocate()),
            name: student.name,
            class: student.class,
            year: student.year,
            house_id: student.house_id,
        };
        state.students.push(student.clone());
        Ok(student)
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let state = self.state()?;
        Ok(state.students.iter().find(|student| student.id == id).cloned())
    }

    fn students_in_house(&self, house: HouseId) -> Result<Vec<Student>, StoreError> {
        let state = self.state()?;
        let mut students: Vec<Student> = state
            .students
            .iter()
            .filter(|student| student.house_id == house)
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let mut state = self.state()?;
        let event = Event {
            id: EventId(state.allocate()),
            category: event.category,
            name: event.name,
            group_mode: event.group_mode,
            slots_per_house: event.slots_per_house,
            max_participants: event.max_participants,
            max_accompanists: event.max_accompanists,
            points: event.points,
            created_at: Utc::now(),
        };
        state.events.push(event.clone());
        Ok(event)
    }

    fn events(&self, category: EventCategory) -> Result<Vec<Event>, StoreError> {
        let state = self.state()?;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|event| event.category == category)
            .cloned()
            .collect();
        events.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(events)
    }

    fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> Result<(Registration, Vec<RegistrationDetail>), StoreError> {
        let mut state = self.state()?;
        let category = registration.category;
        if !state
            .events
            .iter()
            .any(|event| event.category == category && event.id == registration.event_id)
        {
            return Err(StoreError::NotFound);
        }

        let created_at = Utc::now();
        let stored = Registration {
            id: RegistrationId(state.allocate()),
            category,
            event_id: registration.event_id,
            house_id: registration.house_id,
            created_at,
        };

        let mut details = Vec::with_capacity(registration.members.len());
        for member in registration.members {
            details.push(RegistrationDetail {
                id: DetailId(state.allocate()),
                category,
                registration_id: stored.id,
                student_id: member.student_id,
                role: member.role,
                created_at,
            });
        }

        state.registrations.push(stored.clone());
        state.details.extend(details.iter().cloned());
        Ok((stored, details))
    }

    fn registration(
        &self,
        category: EventCategory,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError> {
        let state = self.state()?;
        Ok(state
            .registrations
            .iter()
            .find(|registration| registration.category == category && registration.id == id)
            .cloned())
    }

    fn registrations_for_house(&self, house: HouseId) -> Result<Vec<Registration>, StoreError> {
        let state = self.state()?;
        Ok(state
            .registrations
            .iter()
            .filter(|registration| registration.house_id == house)
            .cloned()
            .collect())
    }

    fn details(
        &self,
        category: EventCategory,
        registration: RegistrationId,
    ) -> Result<Vec<RegistrationDetail>, StoreError> {
        let state = self.state()?;
        Ok(state
            .details
            .iter()
            .filter(|detail| detail.category == category && detail.registration_id == registration)
            .cloned()
            .collect())
    }

    fn insert_winner(&self, winner: NewWinner) -> Result<Winner, StoreError> {
        let mut state = self.state()?;
        if state.winners.iter().any(|existing| {
            existing.category == winner.category
                && existing.event_id == winner.event_id
                && existing.position == winner.position
        }) {
            return Err(StoreError::Conflict);
        }
        let winner = Winner {
            id: WinnerId(state.allocate()),
            category: winner.category,
            event_id: winner.event_id,
            registration_id: winner.registration_id,
            position: winner.position,
            created_at: Utc::now(),
        };
        state.winners.push(winner.clone());
        Ok(winner)
    }

    fn winners(&self, category: EventCategory) -> Result<Vec<Winner>, StoreError> {
        let state = self.state()?;
        Ok(state
            .winners
            .iter()
            .filter(|winner| winner.category == category)
            .cloned()
            .collect())
    }
}
