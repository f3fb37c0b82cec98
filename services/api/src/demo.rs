use crate::infra::{seed_demo_store, DemoFestival};
use clap::{Args, Subcommand};
use festival::config::AppConfig;
use festival::error::AppError;
use festival::registration::{
    Actor, Decision, DetailRole, EligibilityView, Event, EventCategory, EventId, FestivalStore,
    House, HouseId, MemberRequest, MemoryFestivalStore, NewWinner, Position, RegistrationError,
    RegistrationRequest, RegistrationService, SlotView, SqliteFestivalStore, Student, StudentId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// SQLite database to check against (defaults to FESTIVAL_DATABASE)
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: CheckCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CheckCommand {
    /// May a student join an arts event in the given role?
    Arts {
        #[arg(long)]
        student: u64,
        #[arg(long)]
        event: u64,
        /// participant or accompanist
        #[arg(long, default_value = "participant", value_parser = parse_role)]
        role: DetailRole,
    },
    /// May a student join a sports event?
    Sports {
        #[arg(long)]
        student: u64,
        #[arg(long)]
        event: u64,
    },
    /// Does a house have a registration slot left for an event?
    Slots {
        #[arg(long)]
        house: u64,
        #[arg(long)]
        event: u64,
        /// arts or sports
        #[arg(long, value_parser = parse_category)]
        category: EventCategory,
    },
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip recording winners and printing the leaderboard.
    #[arg(long)]
    pub(crate) skip_results: bool,
}

fn parse_role(raw: &str) -> Result<DetailRole, String> {
    DetailRole::parse(&raw.to_ascii_lowercase())
        .ok_or_else(|| format!("'{raw}' is not a role (expected participant or accompanist)"))
}

fn parse_category(raw: &str) -> Result<EventCategory, String> {
    EventCategory::parse(raw)
        .ok_or_else(|| format!("'{raw}' is not a category (expected arts or sports)"))
}

pub(crate) fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(database) = args.database {
        config.storage.database = Some(database);
    }
    let store = Arc::new(SqliteFestivalStore::open(config.storage.require_database()?)?);
    let service = RegistrationService::new(store);

    let payload = match args.command {
        CheckCommand::Arts {
            student,
            event,
            role,
        } => {
            let decision = service.check_arts(StudentId(student), EventId(event), role)?;
            serde_json::to_string_pretty(&EligibilityView::from(&decision))
        }
        CheckCommand::Sports { student, event } => {
            let decision = service.check_sports(StudentId(student), EventId(event))?;
            serde_json::to_string_pretty(&EligibilityView::from(&decision))
        }
        CheckCommand::Slots {
            house,
            event,
            category,
        } => {
            let decision = service.check_slots(HouseId(house), EventId(event), category)?;
            serde_json::to_string_pretty(&SlotView::from(&decision))
        }
    };

    match payload {
        Ok(json) => println!("{json}"),
        Err(err) => println!("Decision unavailable: {err}"),
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(MemoryFestivalStore::new());
    let festival = seed_demo_store(store.as_ref())?;
    let service = RegistrationService::new(store);

    println!("Festival eligibility demo");
    println!(
        "Houses: {}",
        festival
            .houses
            .iter()
            .map(|house| house.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "Events: {} arts, {} sports",
        festival
            .events
            .iter()
            .filter(|event| event.category == EventCategory::Arts)
            .count(),
        festival
            .events
            .iter()
            .filter(|event| event.category == EventCategory::Sports)
            .count()
    );

    let Some(agni) = festival.houses.first() else {
        println!("No houses seeded; nothing to demonstrate");
        return Ok(());
    };
    let roster = festival.roster(agni);
    let (Some(star), Some(partner)) = (roster.first().copied(), roster.get(1).copied()) else {
        println!("Roster for {} is too small for the demo", agni.name);
        return Ok(());
    };
    let captain = Actor::captain(agni.id);

    println!("\nArts limits for {}", star.name);
    for name in [
        "Solo Singing",
        "Poetry Recitation",
        "Pencil Sketch",
        "Mono Act",
        "Group Dance",
        "Classical Dance",
    ] {
        register_and_report(
            &service,
            &festival,
            &captain,
            agni,
            name,
            &[(star, Some(DetailRole::Participant))],
        );
    }
    register_and_report(
        &service,
        &festival,
        &captain,
        agni,
        "Choir",
        &[
            (partner, Some(DetailRole::Participant)),
            (star, Some(DetailRole::Accompanist)),
        ],
    );

    match service.participation(star.id) {
        Ok(counts) => match serde_json::to_string_pretty(&counts) {
            Ok(json) => println!("  Participation counters:\n{json}"),
            Err(err) => println!("  Participation counters unavailable: {err}"),
        },
        Err(err) => println!("  Participation lookup failed: {err}"),
    }

    println!("\nHouse slots");
    if let Some(relay) = festival.event("4x100m Relay") {
        print_decision(
            "  Relay slot before registering",
            service.check_slots(agni.id, relay.id, relay.category),
        );
    }
    register_and_report(
        &service,
        &festival,
        &captain,
        agni,
        "4x100m Relay",
        &[(star, None), (partner, None)],
    );
    register_and_report(
        &service,
        &festival,
        &captain,
        agni,
        "4x100m Relay",
        &[(partner, None)],
    );

    if args.skip_results {
        return Ok(());
    }

    println!("\nResults");
    record_demo_results(&service, &festival)?;
    let standings = service.leaderboard()?;
    for (rank, standing) in standings.iter().enumerate() {
        println!(
            "  {}. {:<8} arts {:>3}  sports {:>3}  total {:>3}",
            rank + 1,
            standing.house_name,
            standing.arts_points,
            standing.sports_points,
            standing.total_points
        );
    }

    Ok(())
}

fn register_and_report(
    service: &RegistrationService<MemoryFestivalStore>,
    festival: &DemoFestival,
    actor: &Actor,
    house: &House,
    event_name: &str,
    members: &[(&Student, Option<DetailRole>)],
) {
    let Some(event) = festival.event(event_name) else {
        println!("  {event_name}: not seeded");
        return;
    };
    match service.register(actor, request(event, house, members)) {
        Ok(receipt) => println!(
            "  {}: registered {} student(s) as registration {}",
            event.name,
            receipt.details.len(),
            receipt.registration.id
        ),
        Err(RegistrationError::Rejected { reason, .. }) => {
            println!("  {}: rejected ({})", event.name, reason.summary())
        }
        Err(err) => println!("  {}: failed ({err})", event.name),
    }
}

fn request(
    event: &Event,
    house: &House,
    members: &[(&Student, Option<DetailRole>)],
) -> RegistrationRequest {
    RegistrationRequest {
        category: event.category,
        event_id: event.id,
        house_id: house.id,
        members: members
            .iter()
            .map(|(student, role)| MemberRequest {
                student_id: student.id,
                role: *role,
            })
            .collect(),
    }
}

fn print_decision(label: &str, decision: Result<Decision, RegistrationError>) {
    match decision {
        Ok(decision) => println!("{label}: {}", decision.summary()),
        Err(err) => println!("{label}: unavailable ({err})"),
    }
}

/// Every other house enters the sprint; the admin then places the top three.
fn record_demo_results(
    service: &RegistrationService<MemoryFestivalStore>,
    festival: &DemoFestival,
) -> Result<(), AppError> {
    let Some(sprint) = festival.event("100m Sprint") else {
        return Ok(());
    };

    let mut entries = Vec::new();
    for house in festival.houses.iter().skip(1) {
        let Some(runner) = festival.roster(house).first().copied() else {
            continue;
        };
        let receipt = service.register(
            &Actor::captain(house.id),
            request(sprint, house, &[(runner, None)]),
        )?;
        entries.push((house, receipt.registration.id));
    }

    let admin = Actor::admin();
    for ((house, registration_id), position) in entries
        .into_iter()
        .zip([Position::First, Position::Second, Position::Third])
    {
        let winner = service.record_winner(
            &admin,
            NewWinner {
                category: sprint.category,
                event_id: sprint.id,
                registration_id,
                position,
            },
        )?;
        println!(
            "  {} placed {} in {}",
            house.name,
            u8::from(winner.position),
            sprint.name
        );
    }

    let (Some(solo), Some(agni)) = (festival.event("Solo Singing"), festival.houses.first())
    else {
        return Ok(());
    };
    let agni_entries = service.store().registrations_for_house(agni.id)?;
    if let Some(entry) = agni_entries
        .iter()
        .find(|registration| registration.event_id == solo.id)
    {
        service.record_winner(
            &admin,
            NewWinner {
                category: solo.category,
                event_id: solo.id,
                registration_id: entry.id,
                position: Position::First,
            },
        )?;
        println!("  {} placed 1 in {}", agni.name, solo.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parser_is_case_insensitive() {
        assert_eq!(parse_role("Accompanist"), Ok(DetailRole::Accompanist));
        assert!(parse_role("singer").is_err());
    }

    #[test]
    fn category_parser_rejects_unknown_tracks() {
        assert_eq!(parse_category("sports"), Ok(EventCategory::Sports));
        assert!(parse_category("music").is_err());
    }

    #[test]
    fn demo_runs_against_seeded_store() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }
}
