//! Per-entity update and the sequential / region-parallel tick drivers.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;

use blockworld_ai::{AiError, AiTickReport, EntityQuery, EntityView, NavigationOutcome};
use blockworld_common::{EntityId, InstanceId};

use crate::entity::Entity;

/// Outcome of updating one creature during a tick.
#[derive(Debug)]
pub struct CreatureTick {
    pub id: EntityId,
    pub report: AiTickReport,
    pub navigation: NavigationOutcome,
    /// Set when the creature's AI failed; its goal and route were cleared.
    pub fault: Option<String>,
}

pub(crate) type Snapshot = BTreeMap<EntityId, EntityView>;

type RegionKey = (Option<InstanceId>, i32, i32);

/// Update one entity: goal selection, then navigation, then base update.
///
/// Entities that are not alive are skipped entirely. A failing or panicking
/// AI is contained to this entity: its goal and route are dropped and the
/// fault is reported instead of propagated.
pub(crate) fn update_entity(entity: &mut Entity, tick: u64, world: &dyn EntityQuery) -> Option<CreatureTick> {
    if !entity.is_alive() {
        return None;
    }
    let me = entity.view();
    let speed = entity.movement_speed;
    let Some(creature) = entity.creature.as_mut() else {
        entity.base_update();
        return None;
    };
    let (behavior, navigator) = creature.parts_mut();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let report = behavior.tick(&me, tick, navigator, world)?;
        let navigation = navigator.tick(me.position, speed);
        Ok::<_, AiError>((report, navigation))
    }));

    let fault = match result {
        Ok(Ok((report, navigation))) => {
            entity.position += navigation.delta();
            entity.base_update();
            return Some(CreatureTick {
                id: me.id,
                report,
                navigation,
                fault: None,
            });
        }
        Ok(Err(err)) => err.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::error!(entity = %me.id, kind = %me.kind, %fault, "creature AI failed, clearing goal and route");
    let (behavior, navigator) = creature.parts_mut();
    behavior.reset();
    navigator.clear();
    entity.base_update();
    Some(CreatureTick {
        id: me.id,
        report: AiTickReport::default(),
        navigation: NavigationOutcome::Idle,
        fault: Some(fault),
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panic: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panic: {msg}")
    } else {
        "panic".to_owned()
    }
}

/// Update every entity in id order.
pub(crate) fn tick_sequential(
    entities: &mut BTreeMap<EntityId, Entity>,
    snapshot: &Snapshot,
    tick: u64,
) -> Vec<CreatureTick> {
    entities
        .values_mut()
        .filter_map(|entity| update_entity(entity, tick, snapshot))
        .collect()
}

/// Update entities grouped by (instance, region) on the rayon pool.
///
/// Each region's entities are moved into their own group so workers never
/// share mutable state; AI reads go to the tick-start snapshot. Results come
/// back in id order, identical to [`tick_sequential`].
pub(crate) fn tick_parallel(
    entities: &mut BTreeMap<EntityId, Entity>,
    snapshot: &Snapshot,
    tick: u64,
    region_size: i32,
) -> Vec<CreatureTick> {
    let alive: Vec<EntityId> = entities
        .values()
        .filter(|e| e.is_alive())
        .map(|e| e.id)
        .collect();

    let mut grouped: BTreeMap<RegionKey, Vec<Entity>> = BTreeMap::new();
    for id in alive {
        if let Some(entity) = entities.remove(&id) {
            let (rx, rz) = entity.chunk().region(region_size);
            grouped.entry((entity.instance, rx, rz)).or_default().push(entity);
        }
    }
    let mut groups: Vec<Vec<Entity>> = grouped.into_values().collect();
    tracing::debug!(regions = groups.len(), "ticking regions in parallel");

    let mut results: Vec<CreatureTick> = groups
        .par_iter_mut()
        .flat_map_iter(|group| {
            group
                .iter_mut()
                .filter_map(|entity| update_entity(entity, tick, snapshot))
                .collect::<Vec<_>>()
        })
        .collect();

    for entity in groups.into_iter().flatten() {
        entities.insert(entity.id, entity);
    }
    results.sort_by_key(|r| r.id);
    results
}
