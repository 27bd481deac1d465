//! The plan-editing session: meal lists under undo/redo, plan metadata,
//! lunch-to-dinner mirroring and hydration from saved plans.

use anyhow::{Result, bail};
use thiserror::Error;
use tracing::debug;

use crate::history::History;
use crate::library::IngredientLibrary;
use crate::meals::MealIngredients;
use crate::mirror::{MIRROR_SOURCE, MIRROR_TARGET, mirror_lunch_into_dinner};
use crate::models::{
    Baseline, DEFAULT_CALORIE_TARGET, MacroTargets, Meal, Plan, PlanMeals, PlanSummary,
    TargetPercentages, validate_calorie_target,
};
use crate::nutrition::summarize;
use crate::templates::{MealTemplate, apply_template};
use crate::validation::{MacroValidation, validate_targets};

pub const UNTITLED_PLAN: &str = "Untitled plan";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("{meal} is mirrored from lunch while match-dinner is on")]
    MealLocked { meal: Meal },
    #[error("Ingredient {id} is not in the library")]
    UnknownIngredient { id: i64 },
}

#[derive(Debug, Clone)]
pub struct PlanEditor {
    history: History<MealIngredients>,
    library: IngredientLibrary,
    match_dinner: bool,
    hydrating: bool,
    dirty: bool,
    plan_id: Option<String>,
    name: String,
    calorie_target: i64,
    percentages: TargetPercentages,
    bodyweight_lbs: Option<f64>,
}

impl PlanEditor {
    #[must_use]
    pub fn new(library: IngredientLibrary, max_history: usize) -> Self {
        Self {
            history: History::with_max_history(MealIngredients::default(), max_history),
            library,
            match_dinner: false,
            hydrating: false,
            dirty: false,
            plan_id: None,
            name: UNTITLED_PLAN.to_string(),
            calorie_target: DEFAULT_CALORIE_TARGET,
            percentages: TargetPercentages::default(),
            bodyweight_lbs: None,
        }
    }

    #[must_use]
    pub fn meals(&self) -> &MealIngredients {
        self.history.present()
    }

    #[must_use]
    pub fn library(&self) -> &IngredientLibrary {
        &self.library
    }

    #[must_use]
    pub fn plan_id(&self) -> Option<&str> {
        self.plan_id.as_deref()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn calorie_target(&self) -> i64 {
        self.calorie_target
    }

    #[must_use]
    pub fn percentages(&self) -> TargetPercentages {
        self.percentages
    }

    #[must_use]
    pub fn match_dinner(&self) -> bool {
        self.match_dinner
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn is_hydrating(&self) -> bool {
        self.hydrating
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.hydrating && self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.hydrating && self.history.can_redo()
    }

    fn check_editable(&self, meal: Meal) -> Result<(), EditorError> {
        if self.match_dinner && meal == MIRROR_TARGET {
            return Err(EditorError::MealLocked { meal });
        }
        Ok(())
    }

    /// Install `next`, mirroring lunch into dinner when needed. Recorded in
    /// history unless a load is in progress.
    fn commit(&mut self, meal: Meal, next: MealIngredients) {
        let next = if self.match_dinner && meal == MIRROR_SOURCE {
            mirror_lunch_into_dinner(&next, &self.library)
        } else {
            next
        };
        if self.hydrating {
            self.history.replace(next);
        } else {
            self.history.set_state(next);
            self.dirty = true;
        }
    }

    pub fn add_ingredient(&mut self, meal: Meal, id: i64) -> Result<()> {
        self.check_editable(meal)?;
        let base = self
            .library
            .get(id)
            .ok_or(EditorError::UnknownIngredient { id })?;
        let next = self.meals().add_ingredient(meal, base);
        self.commit(meal, next);
        Ok(())
    }

    pub fn update_amount(&mut self, meal: Meal, id: i64, amount: f64) -> Result<()> {
        self.check_editable(meal)?;
        if !self.meals().contains(meal, id) {
            bail!("Ingredient {id} is not in {meal}");
        }
        let next = self.meals().update_amount(meal, id, amount, &self.library);
        self.commit(meal, next);
        Ok(())
    }

    pub fn update_serving(&mut self, meal: Meal, id: i64, serving: &str) -> Result<()> {
        self.check_editable(meal)?;
        let next = self.meals().update_serving(meal, id, serving, &self.library)?;
        self.commit(meal, next);
        Ok(())
    }

    pub fn remove_ingredient(&mut self, meal: Meal, id: i64) -> Result<()> {
        self.check_editable(meal)?;
        if !self.meals().contains(meal, id) {
            bail!("Ingredient {id} is not in {meal}");
        }
        let next = self.meals().remove_ingredient(meal, id);
        self.commit(meal, next);
        Ok(())
    }

    /// Drop `template` into `meal` as a single undo step. Returns the names
    /// of template items the library has no ingredient for.
    pub fn apply_template(&mut self, meal: Meal, template: &MealTemplate) -> Result<Vec<String>> {
        self.check_editable(meal)?;
        let applied = apply_template(template, &self.library);
        if !applied.usages.is_empty() {
            let next = self.meals().add_usages(meal, &applied.usages);
            self.commit(meal, next);
        }
        Ok(applied.missing)
    }

    /// Turning mirroring on copies lunch into dinner right away. Turning it
    /// off leaves dinner as it is.
    pub fn set_match_dinner(&mut self, on: bool) {
        if self.match_dinner == on {
            return;
        }
        self.match_dinner = on;
        if !self.hydrating {
            self.dirty = true;
        }
        if on {
            let next = self.meals().clone();
            self.commit(MIRROR_SOURCE, next);
        }
    }

    pub fn set_name(&mut self, name: &str) {
        let name = name.trim();
        self.name = if name.is_empty() {
            UNTITLED_PLAN.to_string()
        } else {
            name.to_string()
        };
        self.dirty = true;
    }

    pub fn set_calorie_target(&mut self, calories: i64) -> Result<()> {
        validate_calorie_target(calories)?;
        self.calorie_target = calories;
        self.dirty = true;
        Ok(())
    }

    /// Bodyweight used to judge protein and fat targets. Not part of the plan.
    pub fn set_bodyweight(&mut self, bodyweight_lbs: Option<f64>) {
        self.bodyweight_lbs = bodyweight_lbs.filter(|w| *w > 0.0 && w.is_finite());
    }

    #[must_use]
    pub fn bodyweight(&self) -> Option<f64> {
        self.bodyweight_lbs
    }

    /// Carbs are derived from protein and fat.
    pub fn set_macro_split(&mut self, protein: i64, fat: i64) -> Result<()> {
        self.percentages = TargetPercentages::new(protein, fat)?;
        self.dirty = true;
        Ok(())
    }

    /// Re-derive the restored snapshot from the current library and keep
    /// dinner mirrored.
    fn settle(&mut self) {
        let mut meals = self.meals().refresh_against_library(&self.library);
        if self.match_dinner {
            meals = mirror_lunch_into_dinner(&meals, &self.library);
        }
        self.history.replace(meals);
    }

    pub fn undo(&mut self) -> bool {
        if self.hydrating || !self.history.undo() {
            return false;
        }
        self.settle();
        self.dirty = true;
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.hydrating || !self.history.redo() {
            return false;
        }
        self.settle();
        self.dirty = true;
        true
    }

    /// Swap in a new ingredient library and refresh every open meal.
    pub fn set_library(&mut self, library: IngredientLibrary) {
        self.library = library;
        self.settle();
    }

    /// Mark the start of an asynchronous load. Edits made until
    /// [`finish_hydration`](Self::finish_hydration) bypass undo history.
    pub fn begin_hydration(&mut self) {
        self.hydrating = true;
    }

    pub fn finish_hydration(&mut self) {
        self.hydrating = false;
    }

    fn hydrate(&mut self, meals: &PlanMeals, match_dinner: bool) {
        self.begin_hydration();
        self.match_dinner = match_dinner;
        let mut loaded = MealIngredients::from_plan_meals(meals, &self.library);
        if match_dinner {
            loaded = mirror_lunch_into_dinner(&loaded, &self.library);
        }
        self.history.replace(loaded);
        self.history.clear_history();
        self.finish_hydration();
        self.dirty = false;
    }

    /// Replace the session with a saved plan. Plans saved before per-meal
    /// lists existed load their ingredients into lunch.
    pub fn load_plan(&mut self, plan: &Plan) {
        debug!(plan_id = %plan.id, "hydrating editor from plan");
        self.plan_id = (!plan.id.is_empty()).then(|| plan.id.clone());
        self.name.clone_from(&plan.name);
        self.calorie_target = plan.calorie_target;
        self.percentages = plan.target_percentages.canonical();
        self.hydrate(&plan.resolved_meals(), plan.match_dinner);
    }

    /// Start a new, unsaved plan from the user's baseline.
    pub fn load_baseline(&mut self, baseline: &Baseline) {
        self.plan_id = None;
        self.name = UNTITLED_PLAN.to_string();
        self.calorie_target = baseline.calorie_target;
        self.percentages = baseline.target_percentages.canonical();
        self.hydrate(&baseline.resolved_meals(), baseline.match_dinner);
    }

    /// Record that the session was written, under `plan_id` if one was
    /// assigned.
    pub fn mark_saved(&mut self, plan_id: Option<String>) {
        if plan_id.is_some() {
            self.plan_id = plan_id;
        }
        self.dirty = false;
    }

    #[must_use]
    pub fn to_plan(&self) -> Plan {
        let meals = self.meals().to_plan_meals();
        Plan {
            id: self.plan_id.clone().unwrap_or_default(),
            owner: None,
            name: self.name.clone(),
            calorie_target: self.calorie_target,
            target_percentages: self.percentages,
            match_dinner: self.match_dinner,
            ingredients: meals.lunch.clone(),
            meals: Some(meals),
            created_at: None,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn to_baseline(&self) -> Baseline {
        let meals = self.meals().to_plan_meals();
        Baseline {
            calorie_target: self.calorie_target,
            target_percentages: self.percentages,
            match_dinner: self.match_dinner,
            ingredients: meals.lunch.clone(),
            meals: Some(meals),
        }
    }

    #[must_use]
    pub fn macro_targets(&self) -> MacroTargets {
        MacroTargets::new(self.calorie_target, self.percentages)
    }

    #[must_use]
    pub fn validation(&self) -> MacroValidation {
        validate_targets(&self.macro_targets(), self.bodyweight_lbs)
    }

    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let mut summary = summarize(self.meals(), &self.library, Some(self.macro_targets()));
        summary.validation = Some(self.validation());
        summary
    }
}
