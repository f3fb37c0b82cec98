use festival::registration::{
    Event, EventCategory, FestivalStore, GroupMode, House, NewEvent, NewStudent, PointTable,
    StoreError, Student,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Rows written by [`seed_demo_store`], in insertion order.
#[derive(Debug, Clone)]
pub(crate) struct DemoFestival {
    pub(crate) houses: Vec<House>,
    pub(crate) students: Vec<Student>,
    pub(crate) events: Vec<Event>,
}

impl DemoFestival {
    pub(crate) fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|event| event.name == name)
    }

    pub(crate) fn roster(&self, house: &House) -> Vec<&Student> {
        self.students
            .iter()
            .filter(|student| student.house_id == house.id)
            .collect()
    }
}

const DEMO_HOUSES: [&str; 4] = ["Agni", "Jal", "Prithvi", "Vayu"];

const DEMO_STUDENTS: [(&str, &str, u8); 3] = [
    ("Aarav", "BA", 1),
    ("Meera", "BSc", 2),
    ("Kabir", "BCom", 3),
];

const DEMO_EVENTS: [(&str, GroupMode, u32, u32, u32); 11] = [
    ("Solo Singing", GroupMode::Single, 2, 1, 1),
    ("Poetry Recitation", GroupMode::Single, 2, 1, 0),
    ("Pencil Sketch", GroupMode::Single, 2, 1, 0),
    ("Mono Act", GroupMode::Single, 2, 1, 0),
    ("Classical Dance", GroupMode::Single, 2, 1, 2),
    ("Group Dance", GroupMode::Group, 1, 8, 2),
    ("Choir", GroupMode::Group, 1, 10, 3),
    ("100m Sprint", GroupMode::Individual, 3, 1, 0),
    ("Long Jump", GroupMode::Individual, 3, 1, 0),
    ("4x100m Relay", GroupMode::Team, 1, 4, 0),
    ("Tug of War", GroupMode::Team, 1, 8, 0),
];

/// Writes a small festival (four houses, three students each, arts and sports events).
///
/// A store that already has houses is left untouched and its rows are returned.
pub(crate) fn seed_demo_store<S>(store: &S) -> Result<DemoFestival, StoreError>
where
    S: FestivalStore + ?Sized,
{
    let existing = store.houses()?;
    if !existing.is_empty() {
        return load_festival(store, existing);
    }

    let mut houses = Vec::with_capacity(DEMO_HOUSES.len());
    let mut students = Vec::new();
    for house_name in DEMO_HOUSES {
        let house = store.insert_house(house_name)?;
        for (name, class, year) in DEMO_STUDENTS {
            students.push(store.insert_student(NewStudent {
                name: format!("{name} ({house_name})"),
                class: Some(class.to_string()),
                year: Some(year),
                house_id: house.id,
            })?);
        }
        houses.push(house);
    }

    let mut events = Vec::with_capacity(DEMO_EVENTS.len());
    for (name, group_mode, slots_per_house, max_participants, max_accompanists) in DEMO_EVENTS {
        let points = match group_mode.category() {
            EventCategory::Arts => PointTable {
                first: 5,
                second: 3,
                third: 1,
            },
            EventCategory::Sports => PointTable {
                first: 10,
                second: 6,
                third: 3,
            },
        };
        events.push(store.insert_event(NewEvent {
            category: group_mode.category(),
            name: name.to_string(),
            group_mode,
            slots_per_house,
            max_participants,
            max_accompanists,
            points,
        })?);
    }

    Ok(DemoFestival {
        houses,
        students,
        events,
    })
}

fn load_festival<S>(store: &S, houses: Vec<House>) -> Result<DemoFestival, StoreError>
where
    S: FestivalStore + ?Sized,
{
    let mut students = Vec::new();
    for house in &houses {
        students.extend(store.students_in_house(house.id)?);
    }
    let mut events = store.events(EventCategory::Arts)?;
    events.extend(store.events(EventCategory::Sports)?);

    Ok(DemoFestival {
        houses,
        students,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use festival::registration::{MemoryFestivalStore, SqliteFestivalStore};

    #[test]
    fn demo_events_are_valid() {
        for (name, group_mode, slots, participants, accompanists) in DEMO_EVENTS {
            let event = NewEvent {
                category: group_mode.category(),
                name: name.to_string(),
                group_mode,
                slots_per_house: slots,
                max_participants: participants,
                max_accompanists: accompanists,
                points: PointTable {
                    first: 1,
                    second: 1,
                    third: 1,
                },
            };
            assert!(event.validate().is_ok(), "{name} should validate");
        }
    }

    #[test]
    fn seeding_fills_every_house() {
        let store = MemoryFestivalStore::new();
        let seeded = seed_demo_store(&store).expect("seed");

        assert_eq!(seeded.houses.len(), 4);
        for house in &seeded.houses {
            assert_eq!(seeded.roster(house).len(), 3);
        }
        assert!(seeded.event("Choir").is_some());
        assert_eq!(
            store.events(EventCategory::Sports).expect("events").len(),
            4
        );
    }

    #[test]
    fn reseeding_a_database_reuses_its_rows() {
        let path = std::env::temp_dir()
            .join(format!("festival-api-seed-{}", std::process::id()))
            .join("festival.db");
        let _ = std::fs::remove_file(&path);

        let first = {
            let store = SqliteFestivalStore::open(&path).expect("open");
            seed_demo_store(&store).expect("first seed")
        };

        let store = SqliteFestivalStore::open(&path).expect("reopen");
        let second = seed_demo_store(&store).expect("second seed");

        assert_eq!(second.houses, first.houses);
        assert_eq!(second.students.len(), first.students.len());
        assert_eq!(second.events.len(), first.events.len());
        assert_eq!(store.houses().expect("houses").len(), 4);
        assert!(second.event("Choir").is_some());

        let _ = std::fs::remove_file(&path);
    }
}
