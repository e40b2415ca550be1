//! Trigger evaluator — turns one location update into rule firings.
//!
//! For every rule and entity the evaluator keeps a boolean containment
//! memory (absent means "outside"). On each update it:
//!
//! 1. records the position in the [`LocationTracker`](crate::location_tracker::LocationTracker),
//! 2. skips disabled rules and rules whose `users` exclude the entity,
//! 3. skips rules whose area is missing (reported once per rule),
//! 4. tests containment and compares it with the remembered value,
//! 5. always stores the new containment, firing or not,
//! 6. emits a [`Firing`] and stamps `last_triggered_at` when the rule's
//!    trigger type matches the transition.
//!
//! Since unseen entities count as outside, an entity first observed inside an
//! area fires `enter` (and `both`) rules immediately and can never fire an
//! `exit` rule on that first observation.

use geohub_domain::geometry::GeoPoint;
use geohub_domain::id::{AreaId, EntityId, RuleId};
use geohub_domain::location::LocationUpdate;
use geohub_domain::rule::Action;
use geohub_domain::time::Timestamp;

use crate::store::GeofenceStore;

/// A rule that matched a transition, with everything needed to act on it.
///
/// The action list is a copy taken under the store lock, so later rule
/// updates or deletes do not affect what gets dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub area_id: AreaId,
    pub entity_id: EntityId,
    /// `true` for an outside → inside transition.
    pub entered: bool,
    pub point: GeoPoint,
    pub actions: Vec<Action>,
    pub fired_at: Timestamp,
}

impl Firing {
    /// `"enter"` or `"exit"`.
    #[must_use]
    pub fn direction(&self) -> &'static str {
        if self.entered { "enter" } else { "exit" }
    }
}

/// Evaluate `update` against every rule in `store`.
///
/// Returns the firings in rule order.
pub fn evaluate(store: &mut GeofenceStore, update: &LocationUpdate, now: Timestamp) -> Vec<Firing> {
    let GeofenceStore {
        areas,
        rules,
        tracker,
        dangling_reported,
    } = store;

    tracker.update_location(&update.entity_id, update.point, update.timestamp);

    let mut firings = Vec::new();
    for rule in rules.iter_mut() {
        if !rule.enabled || !rule.applies_to(&update.entity_id) {
            continue;
        }

        let Some(area) = areas.iter().find(|area| area.id == rule.area_id) else {
            if dangling_reported.insert(rule.id.clone()) {
                tracing::warn!(
                    rule_id = %rule.id,
                    area_id = %rule.area_id,
                    "rule references a missing area, ignoring it"
                );
            }
            continue;
        };

        let is_inside = area.is_point_inside(update.point);
        let was_inside = rule.record_containment(update.entity_id.clone(), is_inside);
        let should_fire = rule.trigger_type.fires(was_inside, is_inside);

        tracing::debug!(
            rule_id = %rule.id,
            entity_id = %update.entity_id,
            was_inside,
            is_inside,
            should_fire,
            "rule evaluated"
        );

        if !should_fire {
            continue;
        }

        rule.last_triggered_at = Some(now);
        firings.push(Firing {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            area_id: rule.area_id.clone(),
            entity_id: update.entity_id.clone(),
            entered: is_inside,
            point: update.point,
            actions: rule.actions.clone(),
            fired_at: now,
        });
    }
    firings
}

#[cfg(test)]
mod tests {
    use super::*;
    use geohub_domain::area::GeofenceArea;
    use geohub_domain::rule::{ActionType, GeofenceRule, TriggerType};
    use geohub_domain::time;

    const INSIDE: GeoPoint = GeoPoint { lat: 0.001, lng: 0.001 };
    const OUTSIDE: GeoPoint = GeoPoint { lat: 1.0, lng: 1.0 };

    fn home() -> GeofenceArea {
        GeofenceArea::builder()
            .id("home")
            .name("Home")
            .circle(GeoPoint::new(0.0, 0.0), 1000.0)
            .build()
            .unwrap()
    }

    fn rule(id: &str, trigger: TriggerType) -> GeofenceRule {
        GeofenceRule::builder()
            .id(id)
            .name(id)
            .area_id("home")
            .trigger_type(trigger)
            .action(Action::new("lamp", ActionType::Toggle))
            .build()
            .unwrap()
    }

    fn store_with(rules: Vec<GeofenceRule>) -> GeofenceStore {
        let mut store = GeofenceStore::default();
        store.upsert_area(home());
        for rule in rules {
            store.upsert_rule(rule);
        }
        store
    }

    fn observe(store: &mut GeofenceStore, entity: &str, point: GeoPoint) -> Vec<Firing> {
        let update = LocationUpdate::new(entity, point, time::now());
        evaluate(store, &update, time::now())
    }

    #[test]
    fn should_fire_enter_rule_on_first_sighting_inside() {
        let mut store = store_with(vec![rule("enter", TriggerType::Enter)]);

        let firings = observe(&mut store, "alice", INSIDE);

        assert_eq!(firings.len(), 1);
        assert!(firings[0].entered);
        assert_eq!(firings[0].direction(), "enter");
        assert_eq!(firings[0].actions.len(), 1);
    }

    #[test]
    fn should_not_fire_exit_rule_on_first_sighting() {
        let mut store = store_with(vec![rule("exit", TriggerType::Exit)]);

        assert!(observe(&mut store, "alice", INSIDE).is_empty());
        assert!(
            store
                .rule(&RuleId::from("exit"))
                .unwrap()
                .was_inside(&EntityId::from("alice"))
        );
    }

    #[test]
    fn should_not_fire_exit_rule_on_first_sighting_outside() {
        let mut store = store_with(vec![rule("exit", TriggerType::Exit)]);
        assert!(observe(&mut store, "alice", OUTSIDE).is_empty());
    }

    #[test]
    fn should_fire_exit_rule_after_leaving() {
        let mut store = store_with(vec![rule("exit", TriggerType::Exit)]);
        observe(&mut store, "alice", INSIDE);

        let firings = observe(&mut store, "alice", OUTSIDE);

        assert_eq!(firings.len(), 1);
        assert!(!firings[0].entered);
    }

    #[test]
    fn should_fire_both_rule_n_minus_one_times_for_alternating_sequence() {
        let mut store = store_with(vec![rule("both", TriggerType::Both)]);
        // Start outside so the first observation only sets the baseline.
        let points = [OUTSIDE, INSIDE, OUTSIDE, INSIDE, OUTSIDE, INSIDE];

        let fired: usize = points
            .iter()
            .map(|point| observe(&mut store, "alice", *point).len())
            .sum();

        assert_eq!(fired, points.len() - 1);
    }

    #[test]
    fn should_not_refire_while_staying_inside() {
        let mut store = store_with(vec![rule("enter", TriggerType::Enter)]);
        assert_eq!(observe(&mut store, "alice", INSIDE).len(), 1);
        assert!(observe(&mut store, "alice", INSIDE).is_empty());
        assert!(observe(&mut store, "alice", INSIDE).is_empty());
    }

    #[test]
    fn should_update_state_even_when_rule_does_not_fire() {
        let mut store = store_with(vec![rule("enter", TriggerType::Enter)]);
        observe(&mut store, "alice", INSIDE);
        // Leaving does not fire an enter rule but is remembered...
        assert!(observe(&mut store, "alice", OUTSIDE).is_empty());
        // ...so coming back fires again.
        assert_eq!(observe(&mut store, "alice", INSIDE).len(), 1);
    }

    #[test]
    fn should_track_entities_independently() {
        let mut store = store_with(vec![rule("enter", TriggerType::Enter)]);
        assert_eq!(observe(&mut store, "alice", INSIDE).len(), 1);
        assert_eq!(observe(&mut store, "bob", INSIDE).len(), 1);
        assert!(observe(&mut store, "alice", INSIDE).is_empty());
    }

    #[test]
    fn should_skip_disabled_rules() {
        let mut disabled = rule("off", TriggerType::Enter);
        disabled.enabled = false;
        let mut store = store_with(vec![disabled]);

        assert!(observe(&mut store, "alice", INSIDE).is_empty());
        assert_eq!(store.rule(&RuleId::from("off")).unwrap().observed_count(), 0);
    }

    #[test]
    fn should_skip_entities_not_listed_in_users() {
        let mut only_bob = rule("bob", TriggerType::Enter);
        only_bob.users.insert(EntityId::from("bob"));
        let mut store = store_with(vec![only_bob]);

        assert!(observe(&mut store, "alice", INSIDE).is_empty());
        assert_eq!(observe(&mut store, "bob", INSIDE).len(), 1);
        let rule = store.rule(&RuleId::from("bob")).unwrap();
        assert!(!rule.has_observed(&EntityId::from("alice")));
    }

    #[test]
    fn should_keep_rule_with_missing_area_inert_and_report_once() {
        let mut dangling = rule("dangling", TriggerType::Enter);
        dangling.area_id = AreaId::from("nowhere");
        let mut store = store_with(vec![dangling]);

        assert!(observe(&mut store, "alice", INSIDE).is_empty());
        assert!(observe(&mut store, "alice", INSIDE).is_empty());
        assert_eq!(store.dangling_reported.len(), 1);
        assert_eq!(
            store.rule(&RuleId::from("dangling")).unwrap().observed_count(),
            0
        );
    }

    #[test]
    fn should_stamp_last_triggered_only_when_firing() {
        let mut store = store_with(vec![rule("enter", TriggerType::Enter)]);
        observe(&mut store, "alice", OUTSIDE);
        assert!(
            store
                .rule(&RuleId::from("enter"))
                .unwrap()
                .last_triggered_at
                .is_none()
        );

        let now = time::now();
        let update = LocationUpdate::new("alice", INSIDE, now);
        evaluate(&mut store, &update, now);

        assert_eq!(
            store.rule(&RuleId::from("enter")).unwrap().last_triggered_at,
            Some(now)
        );
    }

    #[test]
    fn should_record_location_in_tracker() {
        let mut store = store_with(vec![]);
        observe(&mut store, "alice", OUTSIDE);
        let current = store
            .tracker()
            .current_location(&EntityId::from("alice"))
            .unwrap();
        assert_eq!(current.point, OUTSIDE);
    }

    #[test]
    fn should_evaluate_polygon_area() {
        let mut store = GeofenceStore::default();
        store.upsert_area(
            GeofenceArea::builder()
                .id("square")
                .name("Square")
                .polygon(vec![
                    GeoPoint::new(0.0, 0.0),
                    GeoPoint::new(0.0, 10.0),
                    GeoPoint::new(10.0, 10.0),
                    GeoPoint::new(10.0, 0.0),
                ])
                .build()
                .unwrap(),
        );
        let mut both = rule("both", TriggerType::Both);
        both.area_id = AreaId::from("square");
        store.upsert_rule(both);

        assert_eq!(observe(&mut store, "alice", GeoPoint::new(5.0, 5.0)).len(), 1);
        let exits = observe(&mut store, "alice", GeoPoint::new(15.0, 5.0));
        assert_eq!(exits.len(), 1);
        assert!(!exits[0].entered);
    }
}
