use std::sync::{Arc, Barrier};
use std::thread;

use super::common::{event, fixture, new_event, seed, seed_participations};
use crate::registration::domain::{
    Actor, DetailRole, EventCategory, EventId, GroupMode, HouseId, Position, StudentId,
};
use crate::registration::eligibility::RejectionReason;
use crate::registration::service::{MemberRequest, RegistrationError, RegistrationRequest};
use crate::registration::store::{EligibilityStore, FestivalStore, NewWinner, StoreError};

fn request(
    event: &crate::registration::domain::Event,
    house: HouseId,
    members: &[(StudentId, Option<DetailRole>)],
) -> RegistrationRequest {
    RegistrationRequest {
        category: event.category,
        event_id: event.id,
        house_id: house,
        members: members
            .iter()
            .map(|&(student_id, role)| MemberRequest { student_id, role })
            .collect(),
    }
}

#[test]
fn captain_registers_own_house() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Group, 2);
    let members = [
        (fx.students[0].id, Some(DetailRole::Participant)),
        (fx.students[1].id, Some(DetailRole::Participant)),
        (fx.students[2].id, Some(DetailRole::Accompanist)),
    ];

    let receipt = fx
        .service
        .register(&Actor::captain(fx.house.id), request(&target, fx.house.id, &members))
        .expect("registration accepted");

    assert_eq!(receipt.registration.event_id, target.id);
    assert_eq!(receipt.details.len(), 3);
    assert_eq!(
        fx.store
            .details(EventCategory::Arts, receipt.registration.id)
            .expect("details")
            .len(),
        3
    );
    let accompanist = fx
        .service
        .participation(fx.students[2].id)
        .expect("counts");
    assert_eq!(accompanist.total(), 0);
}

#[test]
fn captain_cannot_register_another_house() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Single, 2);
    let members = [(fx.rival_student.id, Some(DetailRole::Participant))];

    let error = fx
        .service
        .register(&Actor::captain(fx.house.id), request(&target, fx.rival.id, &members))
        .expect_err("forbidden");
    assert!(matches!(error, RegistrationError::Forbidden));
    assert_eq!(
        fx.store
            .count_registrations(EventCategory::Arts, fx.rival.id, target.id)
            .expect("count"),
        0
    );
}

#[test]
fn rejected_member_leaves_nothing_written() {
    let fx = fixture();
    let capped = fx.students[1].id;
    seed_participations(&fx.store, GroupMode::Single, fx.house.id, capped, 4);
    let target = event(&fx.store, GroupMode::Group, 2);
    let members = [
        (fx.students[0].id, Some(DetailRole::Participant)),
        (capped, Some(DetailRole::Participant)),
    ];

    // Single participations do not count toward the group limit.
    fx.service
        .register(&Actor::admin(), request(&target, fx.house.id, &members))
        .expect("group registration accepted");

    seed_participations(&fx.store, GroupMode::Group, fx.house.id, capped, 1);
    let error = fx
        .service
        .register(&Actor::admin(), request(&target, fx.house.id, &members))
        .expect_err("group limit reached");

    match error {
        RegistrationError::Rejected { student_id, reason } => {
            assert_eq!(student_id, Some(capped));
            assert!(matches!(
                reason,
                RejectionReason::LimitExceeded {
                    mode: GroupMode::Group,
                    ..
                }
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        fx.store
            .count_registrations(EventCategory::Arts, fx.house.id, target.id)
            .expect("count"),
        1
    );
}

#[test]
fn exhausted_slots_reject_with_conflict() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Individual, 1);
    seed(&fx.store, &target, fx.house.id, fx.students[0].id, None);

    let error = fx
        .service
        .register(
            &Actor::captain(fx.house.id),
            request(&target, fx.house.id, &[(fx.students[1].id, None)]),
        )
        .expect_err("slots exhausted");
    assert_eq!(error.status_code(), axum::http::StatusCode::CONFLICT);
    assert_eq!(
        error.to_string(),
        "registration rejected: House has used all 1 slots for this event"
    );
}

#[test]
fn unknown_event_is_rejected() {
    let fx = fixture();
    let error = fx
        .service
        .register(
            &Actor::admin(),
            RegistrationRequest {
                category: EventCategory::Sports,
                event_id: EventId(404),
                house_id: fx.house.id,
                members: vec![MemberRequest {
                    student_id: fx.students[0].id,
                    role: None,
                }],
            },
        )
        .expect_err("unknown event");
    assert!(matches!(
        error,
        RegistrationError::Rejected {
            reason: RejectionReason::EventNotFound { .. },
            ..
        }
    ));
}

#[test]
fn malformed_member_lists_are_invalid() {
    let fx = fixture();
    let arts = event(&fx.store, GroupMode::Single, 3);
    let sports = event(&fx.store, GroupMode::Team, 3);
    let admin = Actor::admin();
    let asha = fx.students[0].id;

    let cases = [
        request(&arts, fx.house.id, &[]),
        request(&arts, fx.house.id, &[(asha, None)]),
        request(
            &arts,
            fx.house.id,
            &[
                (asha, Some(DetailRole::Participant)),
                (asha, Some(DetailRole::Accompanist)),
            ],
        ),
        request(&arts, fx.house.id, &[(asha, Some(DetailRole::Accompanist))]),
        request(
            &arts,
            fx.house.id,
            &[(fx.rival_student.id, Some(DetailRole::Participant))],
        ),
        request(
            &arts,
            fx.house.id,
            &[(StudentId(777), Some(DetailRole::Participant))],
        ),
        request(&sports, fx.house.id, &[(asha, Some(DetailRole::Accompanist))]),
    ];

    for case in cases {
        let error = fx
            .service
            .register(&admin, case.clone())
            .expect_err("invalid request");
        assert!(
            matches!(error, RegistrationError::Invalid(_)),
            "expected invalid for {case:?}, got {error:?}"
        );
    }
}

#[test]
fn participant_cap_is_enforced() {
    let fx = fixture();
    let mut capped = new_event(GroupMode::Group, 3);
    capped.max_participants = 2;
    let target = fx.service.create_event(&Actor::admin(), capped).expect("event");

    let members: Vec<_> = fx.students[..3]
        .iter()
        .map(|student| (student.id, Some(DetailRole::Participant)))
        .collect();
    let error = fx
        .service
        .register(&Actor::admin(), request(&target, fx.house.id, &members))
        .expect_err("too many participants");
    assert!(matches!(error, RegistrationError::Invalid(_)));
}

#[test]
fn sports_role_is_dropped_on_write() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Team, 3);
    let receipt = fx
        .service
        .register(
            &Actor::admin(),
            request(
                &target,
                fx.house.id,
                &[(fx.students[0].id, Some(DetailRole::Participant))],
            ),
        )
        .expect("sports registration");
    assert!(receipt.details.iter().all(|detail| detail.role.is_none()));
}

#[test]
fn concurrent_registrations_cannot_overrun_a_limit() {
    let fx = fixture();
    let student = fx.students[0].id;
    seed_participations(&fx.store, GroupMode::Single, fx.house.id, student, 3);
    let first = event(&fx.store, GroupMode::Single, 5);
    let second = event(&fx.store, GroupMode::Single, 5);

    let service = Arc::new(fx.service);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [first.clone(), second.clone()]
        .into_iter()
        .map(|target| {
            let service = service.clone();
            let barrier = barrier.clone();
            let house = fx.house.id;
            thread::spawn(move || {
                barrier.wait();
                service.register(
                    &Actor::captain(house),
                    request(&target, house, &[(student, Some(DetailRole::Participant))]),
                )
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert_eq!(
        service
            .participation(student)
            .expect("counts")
            .arts_single,
        4
    );
}

#[test]
fn concurrent_registrations_cannot_overrun_slots() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Individual, 1);

    let service = Arc::new(fx.service);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = fx.students[..2]
        .iter()
        .map(|student| {
            let service = service.clone();
            let barrier = barrier.clone();
            let target = target.clone();
            let house = fx.house.id;
            let student = student.id;
            thread::spawn(move || {
                barrier.wait();
                service.register(&Actor::captain(house), request(&target, house, &[(student, None)]))
            })
        })
        .collect();

    let accepted = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .filter(Result::is_ok)
        .count();
    assert_eq!(accepted, 1);
    assert_eq!(
        fx.store
            .count_registrations(EventCategory::Sports, fx.house.id, target.id)
            .expect("count"),
        1
    );
}

#[test]
fn only_admins_create_events() {
    let fx = fixture();
    let error = fx
        .service
        .create_event(&Actor::captain(fx.house.id), new_event(GroupMode::Single, 2))
        .expect_err("forbidden");
    assert!(matches!(error, RegistrationError::Forbidden));

    let mut broken = new_event(GroupMode::Team, 2);
    broken.slots_per_house = 0;
    let error = fx
        .service
        .create_event(&Actor::admin(), broken)
        .expect_err("invalid event");
    assert_eq!(
        error.status_code(),
        axum::http::StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[test]
fn winners_must_match_their_event_and_position() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Single, 3);
    let other = event(&fx.store, GroupMode::Single, 3);
    let first = seed(
        &fx.store,
        &target,
        fx.house.id,
        fx.students[0].id,
        Some(DetailRole::Participant),
    );
    let second = seed(
        &fx.store,
        &target,
        fx.rival.id,
        fx.rival_student.id,
        Some(DetailRole::Participant),
    );

    let winner = NewWinner {
        category: EventCategory::Arts,
        event_id: target.id,
        registration_id: first.id,
        position: Position::First,
    };
    let error = fx
        .service
        .record_winner(&Actor::captain(fx.house.id), winner)
        .expect_err("captains cannot record winners");
    assert!(matches!(error, RegistrationError::Forbidden));

    fx.service
        .record_winner(&Actor::admin(), winner)
        .expect("winner recorded");

    let duplicate = NewWinner {
        registration_id: second.id,
        ..winner
    };
    let error = fx
        .service
        .record_winner(&Actor::admin(), duplicate)
        .expect_err("position taken");
    assert!(matches!(error, RegistrationError::Store(StoreError::Conflict)));

    let misplaced = NewWinner {
        event_id: other.id,
        registration_id: second.id,
        position: Position::Second,
        ..winner
    };
    let error = fx
        .service
        .record_winner(&Actor::admin(), misplaced)
        .expect_err("registration belongs to another event");
    assert!(matches!(error, RegistrationError::Invalid(_)));
}

#[test]
fn house_summary_is_scoped_to_the_captain() {
    let fx = fixture();
    let target = event(&fx.store, GroupMode::Single, 3);
    seed(
        &fx.store,
        &target,
        fx.house.id,
        fx.students[0].id,
        Some(DetailRole::Participant),
    );

    let summary = fx
        .service
        .house_summary(&Actor::captain(fx.house.id), fx.house.id)
        .expect("summary");
    assert_eq!(summary.students.len(), 4);
    assert_eq!(summary.registrations.len(), 1);
    assert_eq!(
        summary.registrations[0].event_name.as_deref(),
        Some(target.name.as_str())
    );

    let error = fx
        .service
        .house_summary(&Actor::captain(fx.house.id), fx.rival.id)
        .expect_err("other house");
    assert!(matches!(error, RegistrationError::Forbidden));
}

#[test]
fn participation_of_unknown_student_is_not_found() {
    let fx = fixture();
    let error = fx
        .service
        .participation(StudentId(12_345))
        .expect_err("unknown student");
    assert_eq!(error.status_code(), axum::http::StatusCode::NOT_FOUND);
}
