use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info};

use crate::csv_import::{self, ImportSummary};
use crate::db::Database;
use crate::editor::PlanEditor;
use crate::guard::{IdentityGate, RequestTicket};
use crate::history::DEFAULT_MAX_HISTORY;
use crate::library::IngredientLibrary;
use crate::merge::{self, MigrationSummary};
use crate::models::{
    BaseIngredient, Baseline, CalculatorProfile, Identity, LookupCandidate, Meal,
    NutritionDetails, Plan, PlanPatch, RawIngredient, UserPreferences,
};
use crate::normalize::normalize;
use crate::persistence::PlanPersistence;
use crate::remote::RemoteStore;
use crate::storage::LocalStore;
use crate::templates::{self, MealTemplate};

/// Platform-native nutrition lookup provider.
///
/// The CLI implements this with reqwest against OpenFoodFacts. Called
/// synchronously, so UI callers should invoke it off the main thread.
pub trait NutritionLookup: Send + Sync {
    fn search_by_name(&self, text: &str) -> Result<Vec<LookupCandidate>>;
    fn fetch_details_by_name(&self, text: &str) -> Result<Option<NutritionDetails>>;
}

pub struct PlannerService {
    local: LocalStore,
    remote: Box<dyn RemoteStore>,
    gate: IdentityGate,
    max_history: usize,
}

impl PlannerService {
    /// Open the device store at `local_path` and the remote store at
    /// `remote_path`. The last signed-in identity is restored.
    pub fn new(local_path: &Path, remote_path: &Path) -> Result<Self> {
        let local = Database::open(local_path)
            .with_context(|| format!("Failed to open local store {}", local_path.display()))?;
        let remote = Database::open(remote_path)
            .with_context(|| format!("Failed to open remote store {}", remote_path.display()))?;
        Ok(Self::from_parts(LocalStore::new(local), Box::new(remote)))
    }

    pub fn new_in_memory() -> Result<Self> {
        let local = Database::open_in_memory()?;
        let remote = Database::open_in_memory()?;
        Ok(Self::from_parts(LocalStore::new(local), Box::new(remote)))
    }

    #[must_use]
    pub fn from_parts(local: LocalStore, remote: Box<dyn RemoteStore>) -> Self {
        let identity = local.session_identity();
        Self {
            local,
            remote,
            gate: IdentityGate::new(identity),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    fn persistence(&self) -> PlanPersistence<'_> {
        PlanPersistence::new(&self.local, self.remote.as_ref())
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.gate.current()
    }

    #[must_use]
    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    #[must_use]
    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    // --- Account ---

    /// Switch to `identity` and pull the remote ingredient list onto the
    /// device. Guest data moves into the account only when the session was
    /// signed out; switching from another account first drops that
    /// account's cached ingredients.
    pub fn sign_in(&mut self, identity: Identity) -> Result<MigrationSummary> {
        let was_guest = self.gate.current().is_none();
        if self.gate.switch_to(Some(identity.clone())) {
            self.local.set_session_identity(Some(&identity))?;
            if !was_guest {
                self.local.clear_custom_ingredients()?;
            }
        }

        let summary = if was_guest {
            merge::migrate_guest_data(&self.local, self.remote.as_ref(), &identity)?
        } else {
            MigrationSummary::default()
        };

        let ticket = self.issue_ticket();
        let fetched = self.fetch_remote_ingredients(&ticket)?;
        if let Some(merged) = self.apply_ingredient_sync(&ticket, fetched)? {
            info!(identity = %identity, ingredients = merged.len(), "synced ingredients");
        }
        Ok(summary)
    }

    /// Returns false if nobody was signed in. The account's cached
    /// ingredient list is removed from the device.
    pub fn sign_out(&mut self) -> Result<bool> {
        if !self.gate.switch_to(None) {
            return Ok(false);
        }
        self.local.set_session_identity(None)?;
        self.local.clear_custom_ingredients()?;
        Ok(true)
    }

    /// Ticket for work whose result must only land for the identity that
    /// started it.
    #[must_use]
    pub fn issue_ticket(&self) -> RequestTicket {
        self.gate.issue()
    }

    /// The remote ingredient list of the ticket's identity. Empty for guests.
    pub fn fetch_remote_ingredients(&self, ticket: &RequestTicket) -> Result<Vec<BaseIngredient>> {
        let Some(identity) = ticket.identity() else {
            return Ok(Vec::new());
        };
        self.remote
            .load_custom_ingredients(identity)
            .context("Failed to load remote ingredients")
    }

    /// Merge a fetched remote list into the device list. Returns `None`, and
    /// leaves the device untouched, if the identity changed since `ticket`
    /// was issued.
    pub fn apply_ingredient_sync(
        &self,
        ticket: &RequestTicket,
        fetched: Vec<BaseIngredient>,
    ) -> Result<Option<Vec<BaseIngredient>>> {
        let Some(fetched) = self.gate.complete(ticket, fetched) else {
            debug!("identity changed since the ingredient fetch started, dropping it");
            return Ok(None);
        };
        merge::adopt_remote_ingredients(&self.local, &fetched).map(Some)
    }

    // --- Preferences and profile ---

    pub fn preferences(&self) -> Result<UserPreferences> {
        self.persistence().load_preferences(self.identity())
    }

    pub fn set_preferences(&self, preferences: &UserPreferences) -> Result<()> {
        self.persistence()
            .save_preferences(self.identity(), preferences)
    }

    #[must_use]
    pub fn calculator_profile(&self) -> Option<CalculatorProfile> {
        self.local.calculator_profile()
    }

    /// Stamps `saved_at` when the caller left it empty.
    pub fn save_calculator_profile(&self, profile: &CalculatorProfile) -> Result<()> {
        let profile = CalculatorProfile {
            saved_at: profile
                .saved_at
                .clone()
                .or_else(|| Some(Utc::now().to_rfc3339())),
            ..profile.clone()
        };
        self.local.save_calculator_profile(&profile)
    }

    fn bodyweight_lbs(&self) -> Option<f64> {
        self.local
            .calculator_profile()
            .and_then(|p| p.bodyweight_lbs())
    }

    // --- Ingredients ---

    /// Standard items plus the device's custom list.
    #[must_use]
    pub fn library(&self) -> IngredientLibrary {
        IngredientLibrary::with_standard(self.persistence().load_custom_ingredients())
    }

    pub fn add_ingredient(&self, raw: &RawIngredient) -> Result<BaseIngredient> {
        self.persistence()
            .add_custom_ingredient(self.identity(), &normalize(raw))
    }

    pub fn update_ingredient(&self, ingredient: &BaseIngredient) -> Result<Vec<BaseIngredient>> {
        self.persistence()
            .upsert_custom_ingredient(self.identity(), ingredient)
    }

    pub fn remove_ingredient(&self, id: i64) -> Result<Vec<BaseIngredient>> {
        self.persistence()
            .remove_custom_ingredient(self.identity(), id)
    }

    fn store_imported(&self, mut summary: ImportSummary) -> Result<ImportSummary> {
        let parsed = summary.ingredients.len();
        let stored = self
            .persistence()
            .add_custom_ingredients(self.identity(), &summary.ingredients)?;
        summary.failed += parsed - stored.len();
        summary.imported = stored.len();
        summary.ingredients = stored;
        Ok(summary)
    }

    pub fn import_csv(&self, csv_data: &str) -> Result<ImportSummary> {
        let summary = csv_import::parse_ingredient_csv(csv_data.as_bytes())?;
        self.store_imported(summary)
    }

    pub fn import_json(&self, json: &str) -> Result<ImportSummary> {
        let summary = csv_import::parse_ingredient_json(json)?;
        self.store_imported(summary)
    }

    /// Remove custom ingredients whose name repeats an earlier one. Returns
    /// how many were removed.
    pub fn cleanup_duplicate_ingredients(&self) -> Result<usize> {
        let persistence = self.persistence();
        let items = persistence.load_custom_ingredients();
        let unique = merge::dedupe_by_name(&items);
        let removed = items.len() - unique.len();
        if removed > 0 {
            persistence.save_custom_ingredients(self.identity(), &unique)?;
            info!(removed, "removed duplicate custom ingredients");
        }
        Ok(removed)
    }

    /// Store a candidate picked from [`NutritionLookup::search_by_name`]
    /// using the nutrition it was returned with. `None` if the provider
    /// returned it without nutrition.
    pub fn add_candidate(&self, candidate: &LookupCandidate) -> Result<Option<BaseIngredient>> {
        let Some(details) = candidate.details else {
            return Ok(None);
        };
        self.add_ingredient(&details.to_raw(candidate.name.trim()))
            .map(Some)
    }

    /// Look `text` up with the provider and store the result as a custom
    /// ingredient. `None` when the provider has no usable match.
    pub fn lookup_and_add(
        &self,
        provider: &dyn NutritionLookup,
        text: &str,
    ) -> Result<Option<BaseIngredient>> {
        let text = text.trim();
        if text.is_empty() {
            bail!("Lookup text must not be empty");
        }
        let Some(details) = provider.fetch_details_by_name(text)? else {
            return Ok(None);
        };
        self.add_ingredient(&details.to_raw(text)).map(Some)
    }

    #[must_use]
    pub fn recent_ingredients(&self) -> Vec<i64> {
        self.local.recent_ingredients()
    }

    pub fn note_recent(&self, id: i64) -> Result<Vec<i64>> {
        self.local.add_recent(id)
    }

    #[must_use]
    pub fn favorite_ingredients(&self) -> Vec<i64> {
        self.local.favorite_ingredients()
    }

    pub fn toggle_favorite(&self, id: i64) -> Result<bool> {
        if !self.library().contains(id) {
            bail!("Ingredient {id} not found");
        }
        self.local.toggle_favorite(id)
    }

    // --- Plans ---

    pub fn list_plans(&self) -> Result<Vec<Plan>> {
        self.persistence().load_plans(self.identity())
    }

    pub fn get_plan(&self, id: &str) -> Result<Plan> {
        self.persistence().get_plan(self.identity(), id)
    }

    pub fn delete_plan(&self, id: &str) -> Result<Vec<Plan>> {
        self.persistence().remove_plan(self.identity(), id)
    }

    pub fn load_baseline(&self) -> Result<Option<Baseline>> {
        self.persistence().load_baseline(self.identity())
    }

    fn editor(&self) -> PlanEditor {
        let mut editor = PlanEditor::new(self.library(), self.max_history);
        editor.set_bodyweight(self.bodyweight_lbs());
        editor
    }

    /// A fresh editing session, seeded from the baseline when one exists.
    pub fn new_editor(&self) -> Result<PlanEditor> {
        let mut editor = self.editor();
        if let Some(baseline) = self.load_baseline()? {
            editor.load_baseline(&baseline);
        }
        Ok(editor)
    }

    pub fn open_plan(&self, id: &str) -> Result<PlanEditor> {
        let plan = self.get_plan(id)?;
        let mut editor = self.editor();
        editor.load_plan(&plan);
        Ok(editor)
    }

    /// Write the session as a new plan, or over the plan it was opened from.
    pub fn save_editor(&self, editor: &mut PlanEditor) -> Result<Plan> {
        let plan = editor.to_plan();
        let persistence = self.persistence();

        let saved = match editor.plan_id() {
            Some(id) => {
                let id = id.to_string();
                let plans = persistence.update_plan(self.identity(), &id, &PlanPatch::from(&plan))?;
                plans.into_iter().find(|p| p.id == id)
            }
            None => {
                let before: HashSet<String> = persistence
                    .load_plans(self.identity())?
                    .into_iter()
                    .map(|p| p.id)
                    .collect();
                let plans = persistence.add_plan(self.identity(), &plan)?;
                plans.into_iter().find(|p| !before.contains(&p.id))
            }
        };
        let Some(saved) = saved else {
            bail!("Saved plan is missing from the store");
        };

        editor.mark_saved(Some(saved.id.clone()));
        Ok(saved)
    }

    pub fn save_baseline(&self, editor: &PlanEditor) -> Result<()> {
        self.persistence()
            .save_baseline(self.identity(), &editor.to_baseline())
    }

    // --- Templates ---

    /// Predefined and saved templates, for one meal or for all of them.
    #[must_use]
    pub fn templates(&self, meal: Option<Meal>) -> Vec<MealTemplate> {
        let custom = self.local.custom_templates();
        match meal {
            Some(meal) => templates::templates_for(meal, &custom),
            None => Meal::ALL
                .iter()
                .flat_map(|m| templates::templates_for(*m, &custom))
                .collect(),
        }
    }

    pub fn find_template(&self, id: &str) -> Result<MealTemplate> {
        templates::find_template(id, &self.local.custom_templates())
            .with_context(|| format!("Template {id} not found"))
    }

    /// Save one meal of the session as a custom template on this device.
    pub fn save_template(
        &self,
        editor: &PlanEditor,
        meal: Meal,
        name: &str,
        description: &str,
    ) -> Result<MealTemplate> {
        let template =
            templates::template_from_usages(name, description, meal, editor.meals().meal(meal))?;
        self.local.add_custom_template(&template)
    }

    /// Returns false if no saved template has `id`. Predefined templates
    /// cannot be deleted.
    pub fn delete_template(&self, id: &str) -> Result<bool> {
        self.local.remove_custom_template(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::PersistenceError;

    struct MockProvider {
        details: Option<NutritionDetails>,
    }

    impl NutritionLookup for MockProvider {
        fn search_by_name(&self, text: &str) -> Result<Vec<LookupCandidate>> {
            let details = self.details.map(|d| NutritionDetails {
                protein: d.protein + 10.0,
                ..d
            });
            Ok(vec![
                LookupCandidate {
                    name: format!("{text} Original"),
                    brand: Some("Dairy Co".to_string()),
                    details,
                },
                LookupCandidate {
                    name: format!("{text} Bare"),
                    brand: None,
                    details: None,
                },
            ])
        }

        fn fetch_details_by_name(&self, _text: &str) -> Result<Option<NutritionDetails>> {
            Ok(self.details)
        }
    }

    fn alice() -> Identity {
        Identity::new("alice").unwrap()
    }

    fn bob() -> Identity {
        Identity::new("bob").unwrap()
    }

    fn custom_names(items: &[BaseIngredient]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    fn skyr() -> NutritionDetails {
        NutritionDetails {
            grams: 100.0,
            calories: 63.0,
            protein: 11.0,
            carbs: 4.0,
            fat: 0.2,
        }
    }

    #[test]
    fn test_library_includes_custom() {
        let svc = PlannerService::new_in_memory().unwrap();
        assert_eq!(svc.library().len(), 5);

        let raw = RawIngredient::from_json(serde_json::json!({"name": "Tempeh", "calories": 192}));
        let stored = svc.add_ingredient(&raw).unwrap();
        assert_eq!(stored.id, 1000);
        assert_eq!(svc.library().len(), 6);
        assert_eq!(svc.library().get(1000).unwrap().name, "Tempeh");
    }

    #[test]
    fn test_lookup_and_add() {
        let svc = PlannerService::new_in_memory().unwrap();
        let provider = MockProvider {
            details: Some(skyr()),
        };

        let added = svc.lookup_and_add(&provider, " Skyr ").unwrap().unwrap();
        assert_eq!(added.name, "Skyr");
        assert!((added.protein - 11.0).abs() < 0.01);
        assert!(svc.library().contains(added.id));
    }

    #[test]
    fn test_lookup_without_match() {
        let svc = PlannerService::new_in_memory().unwrap();
        let provider = MockProvider { details: None };
        assert!(svc.lookup_and_add(&provider, "nothing").unwrap().is_none());
        assert!(svc.lookup_and_add(&provider, "  ").is_err());
        assert_eq!(svc.library().len(), 5);
    }

    #[test]
    fn test_import_csv_assigns_ids() {
        let svc = PlannerService::new_in_memory().unwrap();
        let csv_data = "name,grams,calories,protein,carbs,fat\nOats,40,150,5,27,2.5\nShort,1\n";
        let summary = svc.import_csv(csv_data).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.ingredients[0].id, 1000);

        let summary = svc.import_json(r#"[{"name": "Kefir"}]"#).unwrap();
        assert_eq!(summary.ingredients[0].id, 1001);
    }

    #[test]
    fn test_guest_editor_save_and_reopen() {
        let svc = PlannerService::new_in_memory().unwrap();
        let mut editor = svc.new_editor().unwrap();
        editor.set_name("Cut week");
        editor.add_ingredient(Meal::Lunch, 1).unwrap();
        assert!(editor.is_dirty());

        let saved = svc.save_editor(&mut editor).unwrap();
        assert!(saved.id.starts_with("guest_"));
        assert!(!editor.is_dirty());
        assert_eq!(editor.plan_id(), Some(saved.id.as_str()));

        editor.update_amount(Meal::Lunch, 1, 250.0).unwrap();
        svc.save_editor(&mut editor).unwrap();
        assert_eq!(svc.list_plans().unwrap().len(), 1);

        let reopened = svc.open_plan(&saved.id).unwrap();
        assert_eq!(reopened.name(), "Cut week");
        assert!((reopened.meals().meal(Meal::Lunch)[0].grams - 250.0).abs() < 0.01);
        assert!(!reopened.can_undo());
    }

    #[test]
    fn test_new_editor_uses_baseline() {
        let svc = PlannerService::new_in_memory().unwrap();
        let mut editor = svc.new_editor().unwrap();
        editor.set_calorie_target(1800).unwrap();
        editor.add_ingredient(Meal::Breakfast, 4).unwrap();
        svc.save_baseline(&editor).unwrap();

        let fresh = svc.new_editor().unwrap();
        assert_eq!(fresh.calorie_target(), 1800);
        assert_eq!(fresh.meals().meal(Meal::Breakfast).len(), 1);
        assert!(!fresh.is_dirty());
    }

    #[test]
    fn test_sign_in_migrates_and_syncs() {
        let mut svc = PlannerService::new_in_memory().unwrap();
        let mut editor = svc.new_editor().unwrap();
        editor.add_ingredient(Meal::Lunch, 2).unwrap();
        svc.save_editor(&mut editor).unwrap();
        let raw = RawIngredient::from_json(serde_json::json!({"name": "Tempeh"}));
        svc.add_ingredient(&raw).unwrap();

        let summary = svc.sign_in(alice()).unwrap();
        assert_eq!(summary.migrated_plans, 1);
        assert_eq!(summary.migrated_ingredients, 1);
        assert_eq!(svc.identity(), Some(&alice()));
        assert_eq!(svc.local().session_identity(), Some(alice()));

        let plans = svc.list_plans().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].owner.as_deref(), Some("alice"));
        assert!(svc.local().guest_plans().is_empty());
        assert!(svc.library().contains(1000));

        assert!(svc.sign_out().unwrap());
        assert!(!svc.sign_out().unwrap());
        assert!(svc.list_plans().unwrap().is_empty());
        assert!(!svc.library().contains(1000));
    }

    #[test]
    fn test_account_ingredients_stay_with_account() {
        let mut svc = PlannerService::new_in_memory().unwrap();
        svc.sign_in(alice()).unwrap();
        let raw = RawIngredient::from_json(serde_json::json!({"name": "Alice secret"}));
        svc.add_ingredient(&raw).unwrap();
        assert!(svc.sign_out().unwrap());

        let summary = svc.sign_in(bob()).unwrap();
        assert_eq!(summary, MigrationSummary::default());
        assert!(svc.remote().load_custom_ingredients(&bob()).unwrap().is_empty());
        assert!(svc.library().iter().all(|i| i.name != "Alice secret"));

        let raw = RawIngredient::from_json(serde_json::json!({"name": "Bob oats"}));
        svc.add_ingredient(&raw).unwrap();
        let stored = svc.remote().load_custom_ingredients(&bob()).unwrap();
        assert_eq!(custom_names(&stored), vec!["Bob oats"]);

        svc.sign_in(alice()).unwrap();
        let cached = svc.persistence().load_custom_ingredients();
        assert_eq!(custom_names(&cached), vec!["Alice secret"]);
    }

    #[test]
    fn test_stale_ingredient_sync_is_dropped() {
        let mut svc = PlannerService::new_in_memory().unwrap();
        svc.sign_in(alice()).unwrap();
        let raw = RawIngredient::from_json(serde_json::json!({"name": "Alice secret"}));
        svc.add_ingredient(&raw).unwrap();

        let ticket = svc.issue_ticket();
        assert_eq!(ticket.identity(), Some(&alice()));
        let fetched = svc.fetch_remote_ingredients(&ticket).unwrap();
        assert_eq!(custom_names(&fetched), vec!["Alice secret"]);

        svc.sign_in(bob()).unwrap();
        assert!(svc.apply_ingredient_sync(&ticket, fetched).unwrap().is_none());
        assert!(svc.persistence().load_custom_ingredients().is_empty());

        let ticket = svc.issue_ticket();
        let fetched = svc.fetch_remote_ingredients(&ticket).unwrap();
        assert_eq!(svc.apply_ingredient_sync(&ticket, fetched).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_add_candidate_uses_its_own_details() {
        let svc = PlannerService::new_in_memory().unwrap();
        let provider = MockProvider {
            details: Some(skyr()),
        };
        let candidates = provider.search_by_name("Skyr").unwrap();

        let added = svc.add_candidate(&candidates[0]).unwrap().unwrap();
        assert_eq!(added.name, "Skyr Original");
        assert!((added.protein - 21.0).abs() < 0.01);
        assert!(svc.add_candidate(&candidates[1]).unwrap().is_none());
        assert_eq!(svc.library().len(), 6);
    }

    #[test]
    fn test_preferences_follow_identity() {
        let mut svc = PlannerService::new_in_memory().unwrap();
        assert!(svc.preferences().unwrap().show_recent_ingredients);
        let hidden = UserPreferences {
            show_recent_ingredients: false,
        };
        svc.set_preferences(&hidden).unwrap();
        svc.save_baseline(&svc.new_editor().unwrap()).unwrap();

        let summary = svc.sign_in(alice()).unwrap();
        assert!(summary.migrated_preferences);
        assert_eq!(svc.preferences().unwrap(), hidden);
        svc.sign_out().unwrap();
        assert!(svc.preferences().unwrap().show_recent_ingredients);
    }

    #[test]
    fn test_cleanup_duplicate_ingredients() {
        let mut svc = PlannerService::new_in_memory().unwrap();
        svc.sign_in(alice()).unwrap();
        let summary = svc
            .import_json(r#"[{"name": "Oats"}, {"name": "oats "}, {"name": "Kefir"}]"#)
            .unwrap();
        assert_eq!(summary.imported, 3);

        assert_eq!(svc.cleanup_duplicate_ingredients().unwrap(), 1);
        assert_eq!(svc.cleanup_duplicate_ingredients().unwrap(), 0);
        let stored = svc.remote().load_custom_ingredients(&alice()).unwrap();
        assert_eq!(custom_names(&stored), vec!["Oats", "Kefir"]);
        assert_eq!(svc.library().len(), 7);
    }

    #[test]
    fn test_templates_saved_and_applied() {
        let svc = PlannerService::new_in_memory().unwrap();
        let mut editor = svc.new_editor().unwrap();
        editor.add_ingredient(Meal::Dinner, 2).unwrap();

        let saved = svc
            .save_template(&editor, Meal::Dinner, "Fish night", "")
            .unwrap();
        assert!(saved.id.starts_with("custom-"));
        assert!(saved.created_at.is_some());
        assert_eq!(svc.find_template(&saved.id).unwrap(), saved);
        assert!(svc.templates(Some(Meal::Dinner)).contains(&saved));
        assert!(!svc.templates(Some(Meal::Lunch)).contains(&saved));
        assert!(svc.templates(None).len() > svc.templates(Some(Meal::Dinner)).len());

        let mut fresh = svc.new_editor().unwrap();
        let missing = fresh.apply_template(Meal::Lunch, &saved).unwrap();
        assert!(missing.is_empty());
        assert_eq!(fresh.meals().meal(Meal::Lunch).len(), 1);

        assert!(svc.delete_template(&saved.id).unwrap());
        assert!(!svc.delete_template(&saved.id).unwrap());
        assert!(!svc.delete_template("chicken-rice").unwrap());
        assert!(svc.find_template(&saved.id).is_err());
    }

    #[test]
    fn test_editor_uses_calculator_bodyweight() {
        let svc = PlannerService::new_in_memory().unwrap();
        assert!(svc.new_editor().unwrap().bodyweight().is_none());
        svc.save_calculator_profile(&CalculatorProfile {
            weight: Some(80.0),
            units: Some("metric".to_string()),
            saved_at: None,
        })
        .unwrap();

        let editor = svc.new_editor().unwrap();
        assert!((editor.bodyweight().unwrap() - 176.37).abs() < 0.01);
        assert!(editor.summary().validation.unwrap().protein.is_some());
    }

    #[test]
    fn test_signed_in_cannot_touch_other_plans() {
        let mut svc = PlannerService::new_in_memory().unwrap();
        svc.sign_in(alice()).unwrap();
        let mut editor = svc.new_editor().unwrap();
        let saved = svc.save_editor(&mut editor).unwrap();

        svc.sign_in(bob()).unwrap();
        let err = svc.delete_plan(&saved.id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PersistenceError>(),
            Some(&PersistenceError::NotOwner { id: saved.id.clone() })
        );
    }

    #[test]
    fn test_favorites_and_recents() {
        let svc = PlannerService::new_in_memory().unwrap();
        assert!(svc.toggle_favorite(3).unwrap());
        assert_eq!(svc.favorite_ingredients(), vec![3]);
        assert!(!svc.toggle_favorite(3).unwrap());
        assert!(svc.toggle_favorite(4242).is_err());

        svc.note_recent(1).unwrap();
        svc.note_recent(2).unwrap();
        assert_eq!(svc.recent_ingredients(), vec![2, 1]);
    }
}
