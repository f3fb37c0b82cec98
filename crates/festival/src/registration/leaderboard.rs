use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::domain::{EventCategory, HouseId, PointTable};
use super::store::{FestivalStore, StoreError};

/// One row of the house standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseStanding {
    pub house_id: HouseId,
    pub house_name: String,
    pub arts_points: u32,
    pub sports_points: u32,
    pub total_points: u32,
}

/// Aggregates winner placements into points per house, highest total first.
///
/// Winners whose registration or event no longer resolves contribute nothing.
/// Totals saturate at `u32::MAX`.
pub fn standings<S>(store: &S) -> Result<Vec<HouseStanding>, StoreError>
where
    S: FestivalStore + ?Sized,
{
    let mut points: HashMap<HouseId, (u32, u32)> = HashMap::new();

    for category in [EventCategory::Arts, EventCategory::Sports] {
        let tables: HashMap<_, PointTable> = store
            .events(category)?
            .into_iter()
            .map(|event| (event.id, event.points))
            .collect();

        for winner in store.winners(category)? {
            let Some(table) = tables.get(&winner.event_id) else {
                continue;
            };
            let Some(registration) = store.registration(category, winner.registration_id)? else {
                continue;
            };
            let awarded = table.for_position(winner.position);
            let entry = points.entry(registration.house_id).or_default();
            match category {
                EventCategory::Arts => entry.0 = entry.0.saturating_add(awarded),
                EventCategory::Sports => entry.1 = entry.1.saturating_add(awarded),
            }
        }
    }

    let mut standings: Vec<HouseStanding> = store
        .houses()?
        .into_iter()
        .map(|house| {
            let (arts_points, sports_points) = points.get(&house.id).copied().unwrap_or_default();
            HouseStanding {
                house_id: house.id,
                house_name: house.name,
                arts_points,
                sports_points,
                total_points: arts_points.saturating_add(sports_points),
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.house_name.cmp(&b.house_name))
    });
    Ok(standings)
}
