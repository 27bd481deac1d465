//! Reconciling device data with the remote store: id-keyed ingredient merge
//! and the one-time guest migration that runs after sign-in.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{BaseIngredient, Identity, Plan};
use crate::remote::RemoteStore;
use crate::storage::LocalStore;

/// Every remote item verbatim, followed by local items whose id the remote
/// does not hold. Remote wins on collisions; within one side the first
/// occurrence of an id wins. Applying it again to its own output is a no-op.
#[must_use]
pub fn merge_ingredients(
    remote: &[BaseIngredient],
    local: &[BaseIngredient],
) -> Vec<BaseIngredient> {
    let mut seen = HashSet::new();
    remote
        .iter()
        .chain(local)
        .filter(|item| seen.insert(item.id))
        .cloned()
        .collect()
}

/// Drop items whose trimmed, lowercased name repeats an earlier one, and
/// items with a blank name. Order is kept.
#[must_use]
pub fn dedupe_by_name(items: &[BaseIngredient]) -> Vec<BaseIngredient> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| {
            let key = item.name.trim().to_lowercase();
            !key.is_empty() && seen.insert(key)
        })
        .cloned()
        .collect()
}

/// Merge the device list into `remote_items` and store the result on the
/// device.
pub fn adopt_remote_ingredients(
    local: &LocalStore,
    remote_items: &[BaseIngredient],
) -> Result<Vec<BaseIngredient>> {
    let merged = merge_ingredients(remote_items, &local.custom_ingredients());
    local.save_custom_ingredients(&merged)?;
    Ok(merged)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub migrated_plans: usize,
    pub failed_plans: usize,
    pub total_guest_plans: usize,
    pub migrated_baseline: bool,
    pub migrated_ingredients: usize,
    pub migrated_preferences: bool,
    /// The remote store already held plans for this identity.
    pub had_conflicts: bool,
}

impl MigrationSummary {
    #[must_use]
    pub fn migrated_anything(&self) -> bool {
        self.migrated_plans > 0
            || self.migrated_baseline
            || self.migrated_ingredients > 0
            || self.migrated_preferences
    }
}

/// Move guest plans, baseline, custom ingredients and preferences into the
/// remote store for `identity`. Runs only when the device holds guest plans
/// or a guest baseline; a cached ingredient list alone is not guest data.
/// A failing item does not stop the rest. Guest storage is cleared only if
/// something was migrated, and items that failed stay on the device.
///
/// Callers must only invoke this for a session that was signed out: the
/// device ingredient list is uploaded as-is.
pub fn migrate_guest_data(
    local: &LocalStore,
    remote: &dyn RemoteStore,
    identity: &Identity,
) -> Result<MigrationSummary> {
    if !local.has_guest_data() {
        return Ok(MigrationSummary::default());
    }
    let guest_plans = local.guest_plans();
    let guest_baseline = local.guest_baseline();
    let guest_ingredients = local.custom_ingredients();
    let guest_preferences = local.guest_preferences();

    let existing = remote
        .load_plans(identity)
        .context("Failed to migrate guest data. Your local data is safe.")?;

    let mut summary = MigrationSummary {
        total_guest_plans: guest_plans.len(),
        had_conflicts: !existing.is_empty(),
        ..MigrationSummary::default()
    };

    let mut failed: Vec<Plan> = Vec::new();
    for plan in &guest_plans {
        match remote.add_plan(identity, &plan.without_guest_fields()) {
            Ok(_) => summary.migrated_plans += 1,
            Err(e) => {
                warn!(plan = %plan.name, error = %e, "failed to migrate plan");
                failed.push(plan.clone());
            }
        }
    }
    summary.failed_plans = failed.len();

    if let Some(baseline) = &guest_baseline {
        match remote.save_baseline(identity, baseline) {
            Ok(()) => summary.migrated_baseline = true,
            Err(e) => warn!(error = %e, "failed to migrate baseline"),
        }
    }

    if !guest_ingredients.is_empty() {
        let result = remote.load_custom_ingredients(identity).and_then(|remote_items| {
            let remote_ids: HashSet<i64> = remote_items.iter().map(|i| i.id).collect();
            let merged = merge_ingredients(&remote_items, &guest_ingredients);
            let added = merged.iter().filter(|i| !remote_ids.contains(&i.id)).count();
            remote.save_custom_ingredients(identity, &merged)?;
            Ok(added)
        });
        match result {
            Ok(added) => summary.migrated_ingredients = added,
            Err(e) => warn!(error = %e, "failed to migrate custom ingredients"),
        }
    }

    if let Some(preferences) = &guest_preferences {
        match remote.save_preferences(identity, preferences) {
            Ok(()) => summary.migrated_preferences = true,
            Err(e) => warn!(error = %e, "failed to migrate preferences"),
        }
    }

    if summary.migrated_anything() {
        local.clear_guest_data()?;
        if !failed.is_empty() {
            local.save_guest_plans(&failed)?;
        }
        if let (false, Some(baseline)) = (summary.migrated_baseline, &guest_baseline) {
            local.save_guest_baseline(baseline)?;
        }
        if let (false, Some(preferences)) = (summary.migrated_preferences, &guest_preferences) {
            local.save_guest_preferences(preferences)?;
        }
    }

    info!(
        identity = %identity,
        plans = summary.migrated_plans,
        failed = summary.failed_plans,
        baseline = summary.migrated_baseline,
        ingredients = summary.migrated_ingredients,
        preferences = summary.migrated_preferences,
        had_conflicts = summary.had_conflicts,
        "guest migration finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use anyhow::bail;

    use crate::db::Database;
    use crate::models::{Baseline, PlanPatch, TargetPercentages, Unit, UserPreferences};
    use crate::normalize::normalize_json;

    fn named(id: i64, name: &str) -> BaseIngredient {
        BaseIngredient {
            id,
            name: name.to_string(),
            unit: Unit::Grams,
            grams_per_unit: 100.0,
            grams: 100.0,
            quantity: 1.0,
            calories: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
            serving_sizes: vec![],
        }
    }

    fn plan(name: &str) -> Plan {
        Plan {
            id: String::new(),
            owner: None,
            name: name.to_string(),
            calorie_target: 1900,
            target_percentages: TargetPercentages::default(),
            match_dinner: false,
            meals: None,
            ingredients: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    fn baseline() -> Baseline {
        Baseline {
            calorie_target: 1700,
            target_percentages: TargetPercentages::default(),
            match_dinner: true,
            meals: None,
            ingredients: vec![],
        }
    }

    #[test]
    fn test_merge_remote_wins() {
        let remote = vec![named(1, "A")];
        let local = vec![named(1, "A-stale"), named(2, "B")];
        let merged = merge_ingredients(&remote, &local);
        let names: Vec<(i64, &str)> = merged.iter().map(|i| (i.id, i.name.as_str())).collect();
        assert_eq!(names, vec![(1, "A"), (2, "B")]);
    }

    #[test]
    fn test_merge_idempotent() {
        let remote = vec![named(1000, "Oats"), named(1002, "Tofu")];
        let local = vec![named(1002, "Old tofu"), named(1001, "Kefir"), named(1000, "x")];
        let once = merge_ingredients(&remote, &local);
        let twice = merge_ingredients(&once, &local);
        assert_eq!(once, twice);
        assert_eq!(merge_ingredients(&remote, &once), once);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_merge_preserves_every_id() {
        let remote = vec![named(5, "r5"), named(7, "r7")];
        let local = vec![named(7, "l7"), named(9, "l9"), named(11, "l11")];
        let merged = merge_ingredients(&remote, &local);
        for r in &remote {
            assert_eq!(merged.iter().find(|m| m.id == r.id), Some(r));
        }
        for l in local.iter().filter(|l| !remote.iter().any(|r| r.id == l.id)) {
            assert_eq!(merged.iter().find(|m| m.id == l.id), Some(l));
        }
    }

    #[test]
    fn test_merge_empty_sides() {
        let items = vec![named(1, "A")];
        assert_eq!(merge_ingredients(&[], &items), items);
        assert_eq!(merge_ingredients(&items, &[]), items);
        assert!(merge_ingredients(&[], &[]).is_empty());
    }

    #[test]
    fn test_adopt_remote_ingredients() {
        let local = LocalStore::in_memory();
        let remote = [normalize_json(serde_json::json!({"id": 1000, "name": "Oats"}))];
        local
            .save_custom_ingredients(&[
                normalize_json(serde_json::json!({"id": 1000, "name": "Stale oats"})),
                normalize_json(serde_json::json!({"id": 1001, "name": "Kefir"})),
            ])
            .unwrap();

        let merged = adopt_remote_ingredients(&local, &remote).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "Oats");
        assert_eq!(local.custom_ingredients(), merged);
    }

    #[test]
    fn test_migrate_everything() {
        let local = LocalStore::in_memory();
        let remote = Database::open_in_memory().unwrap();
        let alice = Identity::new("alice").unwrap();
        local.add_guest_plan(&plan("One")).unwrap();
        local.add_guest_plan(&plan("Two")).unwrap();
        local.save_guest_baseline(&baseline()).unwrap();
        local
            .save_custom_ingredients(&[normalize_json(
                serde_json::json!({"id": 1000, "name": "Oats"}),
            )])
            .unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert_eq!(summary.migrated_plans, 2);
        assert_eq!(summary.total_guest_plans, 2);
        assert_eq!(summary.failed_plans, 0);
        assert!(summary.migrated_baseline);
        assert_eq!(summary.migrated_ingredients, 1);
        assert!(!summary.had_conflicts);

        let plans = remote.load_plans(&alice).unwrap();
        assert_eq!(plans.len(), 2);
        assert!(plans.iter().all(|p| p.owner.as_deref() == Some("alice")));
        assert!(plans.iter().all(|p| !p.id.starts_with("guest_")));
        assert_eq!(remote.load_baseline(&alice).unwrap(), Some(baseline()));
        assert!(!local.has_guest_data());
    }

    #[test]
    fn test_migrate_reports_conflicts() {
        let local = LocalStore::in_memory();
        let remote = Database::open_in_memory().unwrap();
        let alice = Identity::new("alice").unwrap();
        remote.add_plan(&alice, &plan("Existing")).unwrap();
        local.add_guest_plan(&plan("Guest")).unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert!(summary.had_conflicts);
        assert_eq!(remote.load_plans(&alice).unwrap().len(), 2);
    }

    #[test]
    fn test_migrate_nothing_to_do() {
        let local = LocalStore::in_memory();
        let remote = Database::open_in_memory().unwrap();
        let alice = Identity::new("alice").unwrap();
        remote.add_plan(&alice, &plan("Existing")).unwrap();
        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert_eq!(summary, MigrationSummary::default());
    }

    #[test]
    fn test_migrate_does_not_overwrite_remote_ingredients() {
        let local = LocalStore::in_memory();
        let remote = Database::open_in_memory().unwrap();
        let alice = Identity::new("alice").unwrap();
        remote
            .save_custom_ingredients(&alice, &[named(1000, "Remote oats")])
            .unwrap();
        local
            .save_custom_ingredients(&[named(1000, "Guest oats"), named(1001, "Guest kefir")])
            .unwrap();
        local.add_guest_plan(&plan("Guest")).unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert_eq!(summary.migrated_ingredients, 1);
        let stored = remote.load_custom_ingredients(&alice).unwrap();
        assert_eq!(stored[0].name, "Remote oats");
        assert_eq!(stored[1].name, "Guest kefir");
    }

    /// Remote double that refuses plans with a given name.
    struct FlakyRemote {
        inner: Database,
        reject: &'static str,
        attempts: RefCell<usize>,
    }

    impl RemoteStore for FlakyRemote {
        fn load_plans(&self, identity: &Identity) -> Result<Vec<Plan>> {
            self.inner.load_plans(identity)
        }
        fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
            self.inner.get_plan(id)
        }
        fn add_plan(&self, identity: &Identity, plan: &Plan) -> Result<Vec<Plan>> {
            *self.attempts.borrow_mut() += 1;
            if plan.name == self.reject {
                bail!("network error");
            }
            self.inner.add_plan(identity, plan)
        }
        fn update_plan(
            &self,
            identity: &Identity,
            id: &str,
            patch: &PlanPatch,
        ) -> Result<Vec<Plan>> {
            self.inner.update_plan(identity, id, patch)
        }
        fn remove_plan(&self, identity: &Identity, id: &str) -> Result<Vec<Plan>> {
            self.inner.remove_plan(identity, id)
        }
        fn load_baseline(&self, identity: &Identity) -> Result<Option<Baseline>> {
            self.inner.load_baseline(identity)
        }
        fn save_baseline(&self, identity: &Identity, baseline: &Baseline) -> Result<()> {
            self.inner.save_baseline(identity, baseline)
        }
        fn load_custom_ingredients(&self, identity: &Identity) -> Result<Vec<BaseIngredient>> {
            self.inner.load_custom_ingredients(identity)
        }
        fn save_custom_ingredients(
            &self,
            identity: &Identity,
            items: &[BaseIngredient],
        ) -> Result<()> {
            self.inner.save_custom_ingredients(identity, items)
        }
        fn load_preferences(&self, identity: &Identity) -> Result<Option<UserPreferences>> {
            self.inner.load_preferences(identity)
        }
        fn save_preferences(
            &self,
            identity: &Identity,
            preferences: &UserPreferences,
        ) -> Result<()> {
            if self.reject == "preferences" {
                bail!("network error");
            }
            self.inner.save_preferences(identity, preferences)
        }
    }

    #[test]
    fn test_migrate_partial_failure() {
        let local = LocalStore::in_memory();
        let remote = FlakyRemote {
            inner: Database::open_in_memory().unwrap(),
            reject: "Broken",
            attempts: RefCell::new(0),
        };
        let alice = Identity::new("alice").unwrap();
        local.add_guest_plan(&plan("Broken")).unwrap();
        local.add_guest_plan(&plan("Fine")).unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert_eq!(*remote.attempts.borrow(), 2);
        assert_eq!(summary.migrated_plans, 1);
        assert_eq!(summary.failed_plans, 1);
        assert_eq!(summary.total_guest_plans, 2);

        let left = local.guest_plans();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "Broken");
    }

    #[test]
    fn test_migrate_all_failed_keeps_guest_data() {
        let local = LocalStore::in_memory();
        let remote = FlakyRemote {
            inner: Database::open_in_memory().unwrap(),
            reject: "Broken",
            attempts: RefCell::new(0),
        };
        let alice = Identity::new("alice").unwrap();
        local.add_guest_plan(&plan("Broken")).unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert!(!summary.migrated_anything());
        assert_eq!(local.guest_plans().len(), 1);
    }

    #[test]
    fn test_cached_ingredients_alone_are_not_migrated() {
        let local = LocalStore::in_memory();
        let remote = Database::open_in_memory().unwrap();
        let bob = Identity::new("bob").unwrap();
        local
            .save_custom_ingredients(&[named(1000, "Alice secret")])
            .unwrap();

        let summary = migrate_guest_data(&local, &remote, &bob).unwrap();
        assert_eq!(summary, MigrationSummary::default());
        assert!(remote.load_custom_ingredients(&bob).unwrap().is_empty());
    }

    #[test]
    fn test_migrate_preferences() {
        let local = LocalStore::in_memory();
        let remote = Database::open_in_memory().unwrap();
        let alice = Identity::new("alice").unwrap();
        let prefs = UserPreferences {
            show_recent_ingredients: false,
        };
        local.save_guest_baseline(&baseline()).unwrap();
        local.save_guest_preferences(&prefs).unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert!(summary.migrated_preferences);
        assert_eq!(remote.load_preferences(&alice).unwrap(), Some(prefs));
        assert!(local.guest_preferences().is_none());
    }

    #[test]
    fn test_failed_preferences_stay_on_device() {
        let local = LocalStore::in_memory();
        let remote = FlakyRemote {
            inner: Database::open_in_memory().unwrap(),
            reject: "preferences",
            attempts: RefCell::new(0),
        };
        let alice = Identity::new("alice").unwrap();
        let prefs = UserPreferences {
            show_recent_ingredients: false,
        };
        local.add_guest_plan(&plan("Fine")).unwrap();
        local.save_guest_preferences(&prefs).unwrap();

        let summary = migrate_guest_data(&local, &remote, &alice).unwrap();
        assert_eq!(summary.migrated_plans, 1);
        assert!(!summary.migrated_preferences);
        assert!(local.guest_plans().is_empty());
        assert_eq!(local.guest_preferences(), Some(prefs));
    }

    #[test]
    fn test_dedupe_by_name() {
        let items = vec![
            named(1000, "Oats"),
            named(1001, " oats "),
            named(1002, "   "),
            named(1003, "Kefir"),
            named(1004, "KEFIR"),
        ];
        let ids: Vec<i64> = dedupe_by_name(&items).iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1000, 1003]);
        assert!(dedupe_by_name(&[]).is_empty());
    }
}
