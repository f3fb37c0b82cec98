use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::debug;

use super::{
    EligibilityStore, FestivalStore, NewRegistration, NewStudent, NewWinner, ParticipationRow,
    StoreError,
};
use crate::registration::domain::{
    DetailId, DetailRole, Event, EventCategory, EventId, GroupMode, House, HouseId, NewEvent,
    PointTable, Position, Registration, RegistrationDetail, RegistrationId, Student, StudentId,
    Winner, WinnerId,
};

/// SQLite-backed store. One connection guarded by a mutex; writes that belong
/// together run inside a transaction.
pub struct SqliteFestivalStore {
    db: Mutex<Connection>,
}

const EVENT_COLUMNS: &str = "id, category, name, group_mode, slots_per_house, max_participants, \
                             max_accompanists, first_pts, second_pts, third_pts, created_at";

impl SqliteFestivalStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS houses (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            class TEXT,
            year INTEGER,
            house_id INTEGER NOT NULL REFERENCES houses(id)
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            name TEXT NOT NULL,
            group_mode TEXT NOT NULL,
            slots_per_house INTEGER NOT NULL CHECK (slots_per_house >= 1),
            max_participants INTEGER NOT NULL,
            max_accompanists INTEGER NOT NULL DEFAULT 0,
            first_pts INTEGER NOT NULL,
            second_pts INTEGER NOT NULL,
            third_pts INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS registrations (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            event_id INTEGER NOT NULL REFERENCES events(id),
            house_id INTEGER NOT NULL REFERENCES houses(id),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS registration_details (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            registration_id INTEGER NOT NULL REFERENCES registrations(id) ON DELETE CASCADE,
            student_id INTEGER NOT NULL REFERENCES students(id),
            role TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS winners (
            id INTEGER PRIMARY KEY,
            category TEXT NOT NULL,
            event_id INTEGER NOT NULL REFERENCES events(id),
            registration_id INTEGER NOT NULL REFERENCES registrations(id),
            position INTEGER NOT NULL CHECK (position BETWEEN 1 AND 3),
            created_at TEXT NOT NULL,
            UNIQUE (category, event_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_registrations_house_event
        ON registrations(category, house_id, event_id);

        CREATE INDEX IF NOT EXISTS idx_details_student
        ON registration_details(category, student_id);
    ";

    /// Open or create a store database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StoreError::Unavailable(format!(
                        "failed to create directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }
        }
        let db = Connection::open(path)?;
        debug!(path = %path.display(), "opened festival database");
        Self::initialize(db)
    }

    /// Open an in-memory store (for tests and one-off checks).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch("PRAGMA foreign_keys=ON;")?;
        db.execute_batch(Self::SCHEMA)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }
}

impl EligibilityStore for SqliteFestivalStore {
    fn event(&self, category: EventCategory, id: EventId) -> Result<Option<Event>, StoreError> {
        let db = self.connection()?;
        let event = db
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE category = ?1 AND id = ?2"),
                params![category.label(), sql_id(id.0)?],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    fn participations(
        &self,
        category: EventCategory,
        student: StudentId,
    ) -> Result<Vec<ParticipationRow>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare(
            "SELECT r.house_id, e.group_mode
             FROM registration_details d
             JOIN registrations r ON r.id = d.registration_id AND r.category = d.category
             JOIN events e ON e.id = r.event_id AND e.category = r.category
             WHERE d.category = ?1
               AND d.student_id = ?2
               AND (d.role IS NULL OR d.role = 'participant')",
        )?;
        let rows = stmt.query_map(params![category.label(), sql_id(student.0)?], |row| {
            Ok(ParticipationRow {
                house_id: HouseId(row_id(row, 0)?),
                group_mode: group_mode_column(row, 1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count_registrations(
        &self,
        category: EventCategory,
        house: HouseId,
        event: EventId,
    ) -> Result<u32, StoreError> {
        let db = self.connection()?;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM registrations
             WHERE category = ?1 AND house_id = ?2 AND event_id = ?3",
            params![category.label(), sql_id(house.0)?, sql_id(event.0)?],
            |row| row.get(0),
        )?;
        u32::try_from(count).map_err(|_| StoreError::Unavailable("count overflow".to_string()))
    }
}

impl FestivalStore for SqliteFestivalStore {
    fn insert_house(&self, name: &str) -> Result<House, StoreError> {
        let db = self.connection()?;
        db.execute("INSERT INTO houses (name) VALUES (?1)", params![name])?;
        Ok(House {
            id: HouseId(rowid(&db)),
            name: name.to_string(),
        })
    }

    fn houses(&self) -> Result<Vec<House>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare("SELECT id, name FROM houses ORDER BY name ASC")?;
        let rows = stmt.query_map([], house_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn house(&self, id: HouseId) -> Result<Option<House>, StoreError> {
        let db = self.connection()?;
        let house = db
            .query_row(
                "SELECT id, name FROM houses WHERE id = ?1",
                params![sql_id(id.0)?],
                house_from_row,
            )
            .optional()?;
        Ok(house)
    }

    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError> {
        let db = self.connection()?;
        let house_exists: i64 = db.query_row(
            "SELECT COUNT(*) FROM houses WHERE id = ?1",
            params![sql_id(student.house_id.0)?],
            |row| row.get(0),
        )?;
        if house_exists == 0 {
            return Err(StoreError::NotFound);
        }
        db.execute(
            "INSERT INTO students (name, class, year, house_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                &student.name,
                &student.class,
                student.year,
                sql_id(student.house_id.0)?
            ],
        )?;
        Ok(Student {
            id: StudentId(rowid(&db)),
            name: student.name,
            class: student.class,
            year: student.year,
            house_id: student.house_id,
        })
    }

    fn student(&self, id: StudentId) -> Result<Option<Student>, StoreError> {
        let db = self.connection()?;
        let student = db
            .query_row(
                "SELECT id, name, class, year, house_id FROM students WHERE id = ?1",
                params![sql_id(id.0)?],
                student_from_row,
            )
            .optional()?;
        Ok(student)
    }

    fn students_in_house(&self, house: HouseId) -> Result<Vec<Student>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare(
            "SELECT id, name, class, year, house_id FROM students
             WHERE house_id = ?1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map(params![sql_id(house.0)?], student_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let db = self.connection()?;
        let created_at = Utc::now();
        db.execute(
            "INSERT INTO events (category, name, group_mode, slots_per_house, max_participants,
                                 max_accompanists, first_pts, second_pts, third_pts, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.category.label(),
                &event.name,
                event.group_mode.as_str(),
                event.slots_per_house,
                event.max_participants,
                event.max_accompanists,
                event.points.first,
                event.points.second,
                event.points.third,
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(Event {
            id: EventId(rowid(&db)),
            category: event.category,
            name: event.name,
            group_mode: event.group_mode,
            slots_per_house: event.slots_per_house,
            max_participants: event.max_participants,
            max_accompanists: event.max_accompanists,
            points: event.points,
            created_at,
        })
    }

    fn events(&self, category: EventCategory) -> Result<Vec<Event>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE category = ?1 ORDER BY name ASC"
        ))?;
        let rows = stmt.query_map(params![category.label()], event_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> Result<(Registration, Vec<RegistrationDetail>), StoreError> {
        let mut db = self.connection()?;
        let tx = db.transaction()?;
        let category = registration.category;

        let event_exists: i64 = tx.query_row(
            "SELECT COUNT(*) FROM events WHERE category = ?1 AND id = ?2",
            params![category.label(), sql_id(registration.event_id.0)?],
            |row| row.get(0),
        )?;
        if event_exists == 0 {
            return Err(StoreError::NotFound);
        }

        let created_at = Utc::now();
        tx.execute(
            "INSERT INTO registrations (category, event_id, house_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                category.label(),
                sql_id(registration.event_id.0)?,
                sql_id(registration.house_id.0)?,
                created_at.to_rfc3339(),
            ],
        )?;
        let stored = Registration {
            id: RegistrationId(id_from_sql(tx.last_insert_rowid())),
            category,
            event_id: registration.event_id,
            house_id: registration.house_id,
            created_at,
        };

        let mut details = Vec::with_capacity(registration.members.len());
        for member in registration.members {
            tx.execute(
                "INSERT INTO registration_details
                     (category, registration_id, student_id, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    category.label(),
                    sql_id(stored.id.0)?,
                    sql_id(member.student_id.0)?,
                    member.role.map(|role| role.as_str()),
                    created_at.to_rfc3339(),
                ],
            )?;
            details.push(RegistrationDetail {
                id: DetailId(id_from_sql(tx.last_insert_rowid())),
                category,
                registration_id: stored.id,
                student_id: member.student_id,
                role: member.role,
                created_at,
            });
        }

        tx.commit()?;
        Ok((stored, details))
    }

    fn registration(
        &self,
        category: EventCategory,
        id: RegistrationId,
    ) -> Result<Option<Registration>, StoreError> {
        let db = self.connection()?;
        let registration = db
            .query_row(
                "SELECT id, category, event_id, house_id, created_at FROM registrations
                 WHERE category = ?1 AND id = ?2",
                params![category.label(), sql_id(id.0)?],
                registration_from_row,
            )
            .optional()?;
        Ok(registration)
    }

    fn registrations_for_house(&self, house: HouseId) -> Result<Vec<Registration>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare(
            "SELECT id, category, event_id, house_id, created_at FROM registrations
             WHERE house_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![sql_id(house.0)?], registration_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn details(
        &self,
        category: EventCategory,
        registration: RegistrationId,
    ) -> Result<Vec<RegistrationDetail>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare(
            "SELECT id, category, registration_id, student_id, role, created_at
             FROM registration_details
             WHERE category = ?1 AND registration_id = ?2 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(
            params![category.label(), sql_id(registration.0)?],
            detail_from_row,
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_winner(&self, winner: NewWinner) -> Result<Winner, StoreError> {
        let db = self.connection()?;
        let created_at = Utc::now();
        db.execute(
            "INSERT INTO winners (category, event_id, registration_id, position, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                winner.category.label(),
                sql_id(winner.event_id.0)?,
                sql_id(winner.registration_id.0)?,
                u8::from(winner.position),
                created_at.to_rfc3339(),
            ],
        )?;
        Ok(Winner {
            id: WinnerId(rowid(&db)),
            category: winner.category,
            event_id: winner.event_id,
            registration_id: winner.registration_id,
            position: winner.position,
            created_at,
        })
    }

    fn winners(&self, category: EventCategory) -> Result<Vec<Winner>, StoreError> {
        let db = self.connection()?;
        let mut stmt = db.prepare(
            "SELECT id, category, event_id, registration_id, position, created_at
             FROM winners WHERE category = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![category.label()], winner_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict
            }
            _ => StoreError::Unavailable(value.to_string()),
        }
    }
}

fn sql_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Unavailable(format!("id {id} out of range")))
}

fn id_from_sql(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or_default()
}

fn rowid(db: &Connection) -> u64 {
    id_from_sql(db.last_insert_rowid())
}

fn row_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    Ok(id_from_sql(raw))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn category_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<EventCategory> {
    let raw: String = row.get(idx)?;
    EventCategory::parse(&raw)
        .ok_or_else(|| conversion_error(idx, format!("unknown event category '{raw}'")))
}

fn group_mode_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<GroupMode> {
    let raw: String = row.get(idx)?;
    GroupMode::parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown group mode '{raw}'")))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn house_from_row(row: &Row<'_>) -> rusqlite::Result<House> {
    Ok(House {
        id: HouseId(row_id(row, 0)?),
        name: row.get(1)?,
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: StudentId(row_id(row, 0)?),
        name: row.get(1)?,
        class: row.get(2)?,
        year: row.get(3)?,
        house_id: HouseId(row_id(row, 4)?),
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: EventId(row_id(row, 0)?),
        category: category_column(row, 1)?,
        name: row.get(2)?,
        group_mode: group_mode_column(row, 3)?,
        slots_per_house: row.get(4)?,
        max_participants: row.get(5)?,
        max_accompanists: row.get(6)?,
        points: PointTable {
            first: row.get(7)?,
            second: row.get(8)?,
            third: row.get(9)?,
        },
        created_at: timestamp_column(row, 10)?,
    })
}

fn registration_from_row(row: &Row<'_>) -> rusqlite::Result<Registration> {
    Ok(Registration {
        id: RegistrationId(row_id(row, 0)?),
        category: category_column(row, 1)?,
        event_id: EventId(row_id(row, 2)?),
        house_id: HouseId(row_id(row, 3)?),
        created_at: timestamp_column(row, 4)?,
    })
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<RegistrationDetail> {
    let role: Option<String> = row.get(4)?;
    let role = match role {
        Some(raw) => Some(
            DetailRole::parse(&raw)
                .ok_or_else(|| conversion_error(4, format!("unknown detail role '{raw}'")))?,
        ),
        None => None,
    };
    Ok(RegistrationDetail {
        id: DetailId(row_id(row, 0)?),
        category: category_column(row, 1)?,
        registration_id: RegistrationId(row_id(row, 2)?),
        student_id: StudentId(row_id(row, 3)?),
        role,
        created_at: timestamp_column(row, 5)?,
    })
}

fn winner_from_row(row: &Row<'_>) -> rusqlite::Result<Winner> {
    let raw: u8 = row.get(4)?;
    let position = Position::try_from(raw).map_err(|message| conversion_error(4, message))?;
    Ok(Winner {
        id: WinnerId(row_id(row, 0)?),
        category: category_column(row, 1)?,
        event_id: EventId(row_id(row, 2)?),
        registration_id: RegistrationId(row_id(row, 3)?),
        position,
        created_at: timestamp_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::store::NewMember;

    fn store_with_event(mode: GroupMode) -> (SqliteFestivalStore, House, Student, Event) {
        let store = SqliteFestivalStore::open_in_memory().expect("in-memory store");
        let house = store.insert_house("Agni").expect("house");
        let student = store
            .insert_student(NewStudent {
                name: "Asha".to_string(),
                class: Some("BSc".to_string()),
                year: Some(2),
                house_id: house.id,
            })
            .expect("student");
        let event = store
            .insert_event(NewEvent {
                category: mode.category(),
                name: "Solo Song".to_string(),
                group_mode: mode,
                slots_per_house: 2,
                max_participants: 4,
                max_accompanists: 0,
                points: PointTable {
                    first: 5,
                    second: 3,
                    third: 1,
                },
            })
            .expect("event");
        (store, house, student, event)
    }

    #[test]
    fn counts_registrations_exactly() {
        let (store, house, student, event) = store_with_event(GroupMode::Single);
        for _ in 0..2 {
            store
                .insert_registration(NewRegistration {
                    category: EventCategory::Arts,
                    event_id: event.id,
                    house_id: house.id,
                    members: vec![NewMember {
                        student_id: student.id,
                        role: Some(DetailRole::Participant),
                    }],
                })
                .expect("registration");
        }
        let count = store
            .count_registrations(EventCategory::Arts, house.id, event.id)
            .expect("count");
        assert_eq!(count, 2);
        let other = store
            .count_registrations(EventCategory::Sports, house.id, event.id)
            .expect("count");
        assert_eq!(other, 0);
    }

    #[test]
    fn participations_skip_accompanists() {
        let (store, house, student, event) = store_with_event(GroupMode::Single);
        for role in [DetailRole::Participant, DetailRole::Accompanist] {
            store
                .insert_registration(NewRegistration {
                    category: EventCategory::Arts,
                    event_id: event.id,
                    house_id: house.id,
                    members: vec![NewMember {
                        student_id: student.id,
                        role: Some(role),
                    }],
                })
                .expect("registration");
        }
        let rows = store
            .participations(EventCategory::Arts, student.id)
            .expect("rows");
        assert_eq!(
            rows,
            vec![ParticipationRow {
                house_id: house.id,
                group_mode: GroupMode::Single,
            }]
        );
    }

    #[test]
    fn sports_details_without_role_count() {
        let (store, house, student, event) = store_with_event(GroupMode::Team);
        let (registration, _) = store
            .insert_registration(NewRegistration {
                category: EventCategory::Sports,
                event_id: event.id,
                house_id: house.id,
                members: vec![NewMember {
                    student_id: student.id,
                    role: None,
                }],
            })
            .expect("registration");
        let rows = store
            .participations(EventCategory::Sports, student.id)
            .expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group_mode, GroupMode::Team);
        let details = store
            .details(EventCategory::Sports, registration.id)
            .expect("details");
        assert_eq!(details[0].role, None);
    }

    #[test]
    fn registration_for_unknown_event_is_not_found() {
        let (store, house, _, _) = store_with_event(GroupMode::Single);
        let result = store.insert_registration(NewRegistration {
            category: EventCategory::Arts,
            event_id: EventId(999),
            house_id: house.id,
            members: Vec::new(),
        });
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn duplicate_winner_position_conflicts() {
        let (store, house, student, event) = store_with_event(GroupMode::Single);
        let (registration, _) = store
            .insert_registration(NewRegistration {
                category: EventCategory::Arts,
                event_id: event.id,
                house_id: house.id,
                members: vec![NewMember {
                    student_id: student.id,
                    role: Some(DetailRole::Participant),
                }],
            })
            .expect("registration");
        let winner = NewWinner {
            category: EventCategory::Arts,
            event_id: event.id,
            registration_id: registration.id,
            position: Position::First,
        };
        let stored = store.insert_winner(winner).expect("first winner");
        assert_eq!(stored.position, Position::First);
        assert!(matches!(
            store.insert_winner(winner),
            Err(StoreError::Conflict)
        ));
        let winners = store.winners(EventCategory::Arts).expect("winners");
        assert_eq!(winners.len(), 1);
    }

    #[test]
    fn event_round_trips_through_lookup() {
        let (store, _, _, event) = store_with_event(GroupMode::Individual);
        let fetched = store
            .event(EventCategory::Sports, event.id)
            .expect("lookup")
            .expect("present");
        assert_eq!(fetched.group_mode, GroupMode::Individual);
        assert_eq!(fetched.slots_per_house, 2);
        assert!(store
            .event(EventCategory::Arts, event.id)
            .expect("lookup")
            .is_none());
    }
}
