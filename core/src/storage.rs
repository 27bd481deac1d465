//! Local (guest) storage: a JSON-valued key-value store and the typed
//! accessors layered on top of it.

use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    BaseIngredient, Baseline, CalculatorProfile, GUEST_OWNER, Identity, Plan, PlanPatch,
    UserPreferences,
};
use crate::normalize::normalize_json;
use crate::templates::MealTemplate;

pub mod keys {
    pub const CUSTOM_INGREDIENTS: &str = "customIngredients";
    pub const GUEST_PLANS: &str = "guestPlans";
    pub const GUEST_BASELINE: &str = "guestBaseline";
    pub const RECENT_INGREDIENTS: &str = "recentIngredients";
    pub const FAVORITE_INGREDIENTS: &str = "favoriteIngredients";
    pub const CALCULATOR_PROFILE: &str = "calorieCalculatorProfile";
    pub const SESSION_IDENTITY: &str = "sessionIdentity";
    pub const USER_PREFERENCES: &str = "userPreferences";
    pub const CUSTOM_TEMPLATES: &str = "customMealTemplates";

    /// Keys that may be dropped to make room, in eviction order.
    pub const EVICTABLE: [&str; 2] = [RECENT_INGREDIENTS, CALCULATOR_PROFILE];
}

pub const MAX_RECENTS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Local storage is full (writing '{key}')")]
    QuotaExceeded { key: String },
}

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store with an optional size limit over keys plus values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: RefCell::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota_bytes {
            let existing = self
                .entries
                .borrow()
                .get(key)
                .map_or(0, |v| key.len() + v.len());
            if self.used_bytes() - existing + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                }
                .into());
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

fn is_quota_error(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        matches!(
            e.downcast_ref::<StorageError>(),
            Some(StorageError::QuotaExceeded { .. })
        )
    })
}

/// Typed access to the guest data kept on this device.
pub struct LocalStore {
    store: Box<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    #[must_use]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Read and parse `key`. Missing, unreadable and unparseable values all
    /// come back as `None`.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "failed to read local storage");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, error = %e, "ignoring unparseable local storage value");
                None
            }
        }
    }

    /// Serialize and write `value`. When storage is full, drop the
    /// non-critical keys and retry once.
    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).with_context(|| format!("Failed to encode {key}"))?;
        match self.store.set(key, &raw) {
            Ok(()) => Ok(()),
            Err(e) if is_quota_error(&e) => {
                warn!(key, "local storage full, evicting non-critical data");
                for evict in keys::EVICTABLE.into_iter().filter(|k| *k != key) {
                    if let Err(e) = self.store.remove(evict) {
                        warn!(key = evict, error = %e, "failed to evict");
                    }
                }
                self.store.set(key, &raw)
            }
            Err(e) => Err(e),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.store
            .remove(key)
            .with_context(|| format!("Failed to remove {key}"))
    }

    #[must_use]
    pub fn custom_ingredients(&self) -> Vec<BaseIngredient> {
        self.read_json::<Vec<Value>>(keys::CUSTOM_INGREDIENTS)
            .unwrap_or_default()
            .into_iter()
            .map(normalize_json)
            .collect()
    }

    pub fn save_custom_ingredients(&self, items: &[BaseIngredient]) -> Result<()> {
        self.write_json(keys::CUSTOM_INGREDIENTS, items)
    }

    /// Drop the device copy of the custom-ingredient list, e.g. when the
    /// account it was synced from signs out.
    pub fn clear_custom_ingredients(&self) -> Result<()> {
        self.remove(keys::CUSTOM_INGREDIENTS)
    }

    #[must_use]
    pub fn guest_plans(&self) -> Vec<Plan> {
        self.read_json(keys::GUEST_PLANS).unwrap_or_default()
    }

    pub fn save_guest_plans(&self, plans: &[Plan]) -> Result<()> {
        self.write_json(keys::GUEST_PLANS, plans)
    }

    #[must_use]
    pub fn guest_plan(&self, id: &str) -> Option<Plan> {
        self.guest_plans().into_iter().find(|p| p.id == id)
    }

    /// Store a new guest plan under a fresh `guest_<millis>` id.
    pub fn add_guest_plan(&self, plan: &Plan) -> Result<Vec<Plan>> {
        let mut plans = self.guest_plans();
        let now = Utc::now();
        let base_id = format!("guest_{}", now.timestamp_millis());
        let mut id = base_id.clone();
        let mut n = 1;
        while plans.iter().any(|p| p.id == id) {
            id = format!("{base_id}_{n}");
            n += 1;
        }
        let stamp = now.to_rfc3339();
        plans.push(Plan {
            id,
            owner: Some(GUEST_OWNER.to_string()),
            created_at: Some(stamp.clone()),
            updated_at: Some(stamp),
            ..plan.clone()
        });
        self.save_guest_plans(&plans)?;
        Ok(plans)
    }

    /// `None` when no guest plan has `id`.
    pub fn update_guest_plan(&self, id: &str, patch: &PlanPatch) -> Result<Option<Vec<Plan>>> {
        let mut plans = self.guest_plans();
        let Some(plan) = plans.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        patch.apply(plan);
        plan.updated_at = Some(Utc::now().to_rfc3339());
        self.save_guest_plans(&plans)?;
        Ok(Some(plans))
    }

    /// `None` when no guest plan has `id`.
    pub fn remove_guest_plan(&self, id: &str) -> Result<Option<Vec<Plan>>> {
        let mut plans = self.guest_plans();
        let before = plans.len();
        plans.retain(|p| p.id != id);
        if plans.len() == before {
            return Ok(None);
        }
        self.save_guest_plans(&plans)?;
        Ok(Some(plans))
    }

    #[must_use]
    pub fn guest_baseline(&self) -> Option<Baseline> {
        self.read_json(keys::GUEST_BASELINE)
    }

    pub fn save_guest_baseline(&self, baseline: &Baseline) -> Result<()> {
        self.write_json(keys::GUEST_BASELINE, baseline)
    }

    #[must_use]
    pub fn has_guest_data(&self) -> bool {
        !self.guest_plans().is_empty() || self.guest_baseline().is_some()
    }

    pub fn clear_guest_data(&self) -> Result<()> {
        self.remove(keys::GUEST_PLANS)?;
        self.remove(keys::GUEST_BASELINE)?;
        self.remove(keys::USER_PREFERENCES)?;
        debug!("cleared guest plans, baseline and preferences");
        Ok(())
    }

    /// Preferences saved while signed out. `None` if never set.
    #[must_use]
    pub fn guest_preferences(&self) -> Option<UserPreferences> {
        self.read_json(keys::USER_PREFERENCES)
    }

    pub fn save_guest_preferences(&self, preferences: &UserPreferences) -> Result<()> {
        self.write_json(keys::USER_PREFERENCES, preferences)
    }

    #[must_use]
    pub fn calculator_profile(&self) -> Option<CalculatorProfile> {
        self.read_json(keys::CALCULATOR_PROFILE)
    }

    pub fn save_calculator_profile(&self, profile: &CalculatorProfile) -> Result<()> {
        self.write_json(keys::CALCULATOR_PROFILE, profile)
    }

    #[must_use]
    pub fn custom_templates(&self) -> Vec<MealTemplate> {
        self.read_json(keys::CUSTOM_TEMPLATES).unwrap_or_default()
    }

    /// Store `template` under a fresh `custom-<millis>` id.
    pub fn add_custom_template(&self, template: &MealTemplate) -> Result<MealTemplate> {
        let mut templates = self.custom_templates();
        let now = Utc::now();
        let base_id = format!("custom-{}", now.timestamp_millis());
        let mut id = base_id.clone();
        let mut n = 1;
        while templates.iter().any(|t| t.id == id) {
            id = format!("{base_id}-{n}");
            n += 1;
        }
        let stored = MealTemplate {
            id,
            is_custom: true,
            created_at: Some(now.to_rfc3339()),
            ..template.clone()
        };
        templates.push(stored.clone());
        self.write_json(keys::CUSTOM_TEMPLATES, &templates)?;
        Ok(stored)
    }

    /// Returns false if no custom template has `id`.
    pub fn remove_custom_template(&self, id: &str) -> Result<bool> {
        let mut templates = self.custom_templates();
        let before = templates.len();
        templates.retain(|t| t.id != id);
        if templates.len() == before {
            return Ok(false);
        }
        self.write_json(keys::CUSTOM_TEMPLATES, &templates)?;
        Ok(true)
    }

    /// Most recent first.
    #[must_use]
    pub fn recent_ingredients(&self) -> Vec<i64> {
        self.read_json(keys::RECENT_INGREDIENTS).unwrap_or_default()
    }

    pub fn add_recent(&self, id: i64) -> Result<Vec<i64>> {
        let mut recents = self.recent_ingredients();
        recents.retain(|r| *r != id);
        recents.insert(0, id);
        recents.truncate(MAX_RECENTS);
        self.write_json(keys::RECENT_INGREDIENTS, &recents)?;
        Ok(recents)
    }

    #[must_use]
    pub fn favorite_ingredients(&self) -> Vec<i64> {
        self.read_json(keys::FAVORITE_INGREDIENTS).unwrap_or_default()
    }

    #[must_use]
    pub fn is_favorite(&self, id: i64) -> bool {
        self.favorite_ingredients().contains(&id)
    }

    /// Returns whether `id` is a favorite afterwards.
    pub fn toggle_favorite(&self, id: i64) -> Result<bool> {
        let mut favorites = self.favorite_ingredients();
        let now_favorite = if favorites.contains(&id) {
            favorites.retain(|f| *f != id);
            false
        } else {
            favorites.push(id);
            true
        };
        self.write_json(keys::FAVORITE_INGREDIENTS, &favorites)?;
        Ok(now_favorite)
    }

    #[must_use]
    pub fn session_identity(&self) -> Option<Identity> {
        self.read_json(keys::SESSION_IDENTITY)
    }

    pub fn set_session_identity(&self, identity: Option<&Identity>) -> Result<()> {
        match identity {
            Some(id) => self.write_json(keys::SESSION_IDENTITY, id),
            None => self.remove(keys::SESSION_IDENTITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetPercentages;

    fn plan(name: &str) -> Plan {
        Plan {
            id: String::new(),
            owner: None,
            name: name.to_string(),
            calorie_target: 1600,
            target_percentages: TargetPercentages::default(),
            match_dinner: false,
            meals: None,
            ingredients: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();
        assert!(store.get("a").unwrap().is_none());
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_memory_store_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap();
        // replacing a value only counts the new size
        store.set("k", "123456789").unwrap();
        let err = store.set("x", "1").unwrap_err();
        assert!(is_quota_error(&err));
    }

    #[test]
    fn test_unparseable_value_reads_empty() {
        let mem = MemoryStore::new();
        mem.set(keys::GUEST_PLANS, "{not json").unwrap();
        mem.set(keys::RECENT_INGREDIENTS, "\"oops\"").unwrap();
        let local = LocalStore::new(mem);
        assert!(local.guest_plans().is_empty());
        assert!(local.recent_ingredients().is_empty());
    }

    #[test]
    fn test_custom_ingredients_normalized_on_read() {
        let mem = MemoryStore::new();
        mem.set(
            keys::CUSTOM_INGREDIENTS,
            r#"[{"id": 1000, "name": "Oats", "calories": "389", "grams": 40}, 7]"#,
        )
        .unwrap();
        let local = LocalStore::new(mem);
        let items = local.custom_ingredients();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Oats");
        assert!((items[0].calories - 389.0).abs() < 0.01);
        assert!((items[0].grams_per_unit - 40.0).abs() < 0.01);
        assert!(!items[0].serving_sizes.is_empty());
    }

    #[test]
    fn test_guest_plan_crud() {
        let local = LocalStore::in_memory();
        let plans = local.add_guest_plan(&plan("Monday")).unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].id.starts_with("guest_"));
        assert!(plans[0].is_guest());

        let plans = local.add_guest_plan(&plan("Tuesday")).unwrap();
        assert_eq!(plans.len(), 2);
        assert_ne!(plans[0].id, plans[1].id);

        let id = plans[0].id.clone();
        let patch = PlanPatch {
            name: Some("Monday v2".to_string()),
            ..PlanPatch::default()
        };
        let plans = local.update_guest_plan(&id, &patch).unwrap().unwrap();
        assert_eq!(plans[0].name, "Monday v2");
        assert!(local.update_guest_plan("guest_0", &patch).unwrap().is_none());

        let plans = local.remove_guest_plan(&id).unwrap().unwrap();
        assert_eq!(plans.len(), 1);
        assert!(local.remove_guest_plan(&id).unwrap().is_none());
    }

    #[test]
    fn test_recents_bounded_and_deduplicated() {
        let local = LocalStore::in_memory();
        for id in 1..=12 {
            local.add_recent(id).unwrap();
        }
        let recents = local.add_recent(5).unwrap();
        assert_eq!(recents.len(), MAX_RECENTS);
        assert_eq!(recents[0], 5);
        assert_eq!(recents.iter().filter(|r| **r == 5).count(), 1);
        assert_eq!(recents[1], 12);
        assert!(!recents.contains(&1));
    }

    #[test]
    fn test_toggle_favorite() {
        let local = LocalStore::in_memory();
        assert!(local.toggle_favorite(3).unwrap());
        assert!(local.is_favorite(3));
        assert!(!local.toggle_favorite(3).unwrap());
        assert!(!local.is_favorite(3));
    }

    #[test]
    fn test_quota_evicts_non_critical_keys() {
        let mem = MemoryStore::with_quota(200);
        mem.set(keys::RECENT_INGREDIENTS, "[1,2,3,4,5,6,7,8,9,10]").unwrap();
        mem.set(keys::CALCULATOR_PROFILE, &"x".repeat(100)).unwrap();
        let local = LocalStore::new(mem);

        let baseline = Baseline {
            calorie_target: 1800,
            target_percentages: TargetPercentages::default(),
            match_dinner: false,
            meals: None,
            ingredients: vec![],
        };
        local.save_guest_baseline(&baseline).unwrap();
        assert_eq!(local.guest_baseline(), Some(baseline));
        assert!(local.store().get(keys::CALCULATOR_PROFILE).unwrap().is_none());
        assert!(local.recent_ingredients().is_empty());
    }

    #[test]
    fn test_quota_surfaces_error_when_eviction_not_enough() {
        let local = LocalStore::new(MemoryStore::with_quota(40));
        let items: Vec<BaseIngredient> = crate::library::standard_ingredients();
        let err = local.save_custom_ingredients(&items).unwrap_err();
        assert!(is_quota_error(&err));
    }

    #[test]
    fn test_session_identity() {
        let local = LocalStore::in_memory();
        assert!(local.session_identity().is_none());
        let alice = Identity::new("alice").unwrap();
        local.set_session_identity(Some(&alice)).unwrap();
        assert_eq!(local.session_identity(), Some(alice));
        local.set_session_identity(None).unwrap();
        assert!(local.session_identity().is_none());
    }

    #[test]
    fn test_clear_guest_data() {
        let local = LocalStore::in_memory();
        local.add_guest_plan(&plan("x")).unwrap();
        local.add_recent(1).unwrap();
        assert!(local.has_guest_data());
        local.clear_guest_data().unwrap();
        assert!(!local.has_guest_data());
        assert_eq!(local.recent_ingredients(), vec![1]);
    }

    #[test]
    fn test_ingredients_alone_are_not_guest_data() {
        let local = LocalStore::in_memory();
        let oats: BaseIngredient =
            crate::normalize::normalize_json(serde_json::json!({"id": 1000, "name": "Oats"}));
        local.save_custom_ingredients(&[oats]).unwrap();
        local
            .save_guest_preferences(&UserPreferences::default())
            .unwrap();
        assert!(!local.has_guest_data());

        local.clear_custom_ingredients().unwrap();
        assert!(local.custom_ingredients().is_empty());
    }

    #[test]
    fn test_custom_templates() {
        use crate::models::Meal;
        use crate::templates::MealTemplate;

        let local = LocalStore::in_memory();
        let template = MealTemplate {
            id: String::new(),
            name: "Usual".to_string(),
            description: String::new(),
            meal: Meal::Snack,
            items: vec![],
            is_custom: false,
            created_at: None,
        };
        let first = local.add_custom_template(&template).unwrap();
        let second = local.add_custom_template(&template).unwrap();
        assert!(first.id.starts_with("custom-"));
        assert_ne!(first.id, second.id);
        assert!(first.is_custom && first.created_at.is_some());
        assert_eq!(local.custom_templates(), vec![first.clone(), second.clone()]);

        assert!(local.remove_custom_template(&first.id).unwrap());
        assert!(!local.remove_custom_template(&first.id).unwrap());
        assert_eq!(local.custom_templates(), vec![second]);
    }
}
