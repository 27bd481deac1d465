use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::MacroValidation;

/// Ids below this value belong to the built-in ingredient set.
pub const CUSTOM_ID_START: i64 = 1000;

pub const DEFAULT_GRAMS_PER_UNIT: f64 = 100.0;

/// Owner marker stamped on plans that only live in local storage.
pub const GUEST_OWNER: &str = "guest";

pub const DEFAULT_CALORIE_TARGET: i64 = 1400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    #[serde(rename = "g")]
    Grams,
    #[serde(rename = "unit")]
    Count,
}

impl Unit {
    /// Lenient parse: anything that is not `"unit"` is treated as mass.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("unit") {
            Unit::Count
        } else {
            Unit::Grams
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Grams => "g",
            Unit::Count => "unit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingSize {
    pub name: String,
    pub grams: f64,
    #[serde(default)]
    pub is_default: bool,
}

/// Canonical library ingredient. Macros are per `grams_per_unit` grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseIngredient {
    pub id: i64,
    pub name: String,
    pub unit: Unit,
    pub grams_per_unit: f64,
    pub grams: f64,
    pub quantity: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(default)]
    pub serving_sizes: Vec<ServingSize>,
}

impl BaseIngredient {
    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.id >= CUSTOM_ID_START
    }

    #[must_use]
    pub fn serving(&self, name: &str) -> Option<&ServingSize> {
        let name = name.trim();
        self.serving_sizes
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn default_serving(&self) -> Option<&ServingSize> {
        self.serving_sizes
            .iter()
            .find(|s| s.is_default)
            .or_else(|| self.serving_sizes.first())
    }

    /// Macros for `quantity` reference servings, unrounded.
    #[must_use]
    pub fn scaled(&self, quantity: f64) -> Nutrition {
        Nutrition {
            calories: self.calories * quantity,
            protein: self.protein * quantity,
            carbs: self.carbs * quantity,
            fat: self.fat * quantity,
        }
    }
}

/// Loosely-typed ingredient as it arrives from storage, CSV, JSON import
/// or a nutrition lookup. Every field may be missing or hold the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawIngredient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grams_per_unit: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grams: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_sizes: Option<Value>,
}

impl RawIngredient {
    /// Accepts any JSON value; non-objects become an empty record.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        if value.is_object() {
            serde_json::from_value(value).unwrap_or_default()
        } else {
            Self::default()
        }
    }
}

impl From<&BaseIngredient> for RawIngredient {
    fn from(base: &BaseIngredient) -> Self {
        Self {
            id: Some(Value::from(base.id)),
            name: Some(Value::from(base.name.clone())),
            unit: Some(Value::from(base.unit.as_str())),
            grams_per_unit: Some(Value::from(base.grams_per_unit)),
            grams: Some(Value::from(base.grams)),
            quantity: Some(Value::from(base.quantity)),
            calories: Some(Value::from(base.calories)),
            protein: Some(Value::from(base.protein)),
            carbs: Some(Value::from(base.carbs)),
            fat: Some(Value::from(base.fat)),
            serving_sizes: serde_json::to_value(&base.serving_sizes).ok(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Nutrition {
    #[must_use]
    pub fn rounded(self) -> Self {
        Self {
            calories: round_one_decimal(self.calories),
            protein: round_one_decimal(self.protein),
            carbs: round_one_decimal(self.carbs),
            fat: round_one_decimal(self.fat),
        }
    }
}

impl Add for Nutrition {
    type Output = Nutrition;

    fn add(self, rhs: Self) -> Self {
        Self {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl AddAssign for Nutrition {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Nutrition {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Nutrition::default(), Add::add)
    }
}

/// Round half away from zero to one decimal place.
#[must_use]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl Meal {
    pub const ALL: [Meal; 4] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner, Meal::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Meal::Breakfast => "breakfast",
            Meal::Lunch => "lunch",
            Meal::Dinner => "dinner",
            Meal::Snack => "snack",
        }
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn validate_meal(meal: &str) -> Result<Meal> {
    let lower = meal.trim().to_lowercase();
    match Meal::ALL.iter().find(|m| m.as_str() == lower) {
        Some(m) => Ok(*m),
        None => bail!(
            "Invalid meal '{meal}'. Must be one of: {}",
            Meal::ALL.map(Meal::as_str).join(", ")
        ),
    }
}

/// An ingredient reference as stored inside a saved plan or baseline.
/// Legacy entries carry only `grams`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grams: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMeals {
    #[serde(default)]
    pub breakfast: Vec<PlanEntry>,
    #[serde(default)]
    pub lunch: Vec<PlanEntry>,
    #[serde(default)]
    pub dinner: Vec<PlanEntry>,
    #[serde(default)]
    pub snack: Vec<PlanEntry>,
}

impl PlanMeals {
    #[must_use]
    pub fn meal(&self, meal: Meal) -> &[PlanEntry] {
        match meal {
            Meal::Breakfast => &self.breakfast,
            Meal::Lunch => &self.lunch,
            Meal::Dinner => &self.dinner,
            Meal::Snack => &self.snack,
        }
    }
}

/// Macro split in whole percent. `carbs` is always `100 - protein - fat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPercentages {
    pub protein: i64,
    pub fat: i64,
    #[serde(default)]
    pub carbs: i64,
}

impl TargetPercentages {
    pub fn new(protein: i64, fat: i64) -> Result<Self> {
        validate_macro_split(protein, fat)?;
        Ok(Self {
            protein,
            fat,
            carbs: 100 - protein - fat,
        })
    }

    /// Re-derive carbs from the stored protein and fat.
    #[must_use]
    pub fn canonical(self) -> Self {
        Self {
            carbs: 100 - self.protein - self.fat,
            ..self
        }
    }
}

impl Default for TargetPercentages {
    fn default() -> Self {
        Self {
            protein: 40,
            fat: 25,
            carbs: 35,
        }
    }
}

pub fn validate_macro_split(protein: i64, fat: i64) -> Result<()> {
    if protein < 0 || fat < 0 {
        bail!("Macro percentages must be non-negative");
    }
    if protein + fat > 100 {
        bail!(
            "Protein and fat percentages leave no room for carbs (got {})",
            protein + fat
        );
    }
    Ok(())
}

pub fn validate_calorie_target(calories: i64) -> Result<()> {
    if calories <= 0 {
        bail!("Calorie target must be greater than 0");
    }
    Ok(())
}

/// Validate a library ingredient before it is written.
pub fn validate_ingredient(ingredient: &BaseIngredient) -> Result<()> {
    if ingredient.name.trim().is_empty() {
        bail!("Ingredient name must not be empty");
    }
    if ingredient.grams_per_unit <= 0.0 || !ingredient.grams_per_unit.is_finite() {
        bail!("gramsPerUnit must be greater than 0");
    }
    for (label, v) in [
        ("calories", ingredient.calories),
        ("protein", ingredient.protein),
        ("carbs", ingredient.carbs),
        ("fat", ingredient.fat),
    ] {
        if v < 0.0 || !v.is_finite() {
            bail!("{label} must be a non-negative number");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "uid", skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub name: String,
    pub calorie_target: i64,
    pub target_percentages: TargetPercentages,
    #[serde(default)]
    pub match_dinner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meals: Option<PlanMeals>,
    /// Lunch-only list written by older versions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<PlanEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Plan {
    /// Drop the local id and ownership marker before handing the plan to
    /// another store.
    #[must_use]
    pub fn without_guest_fields(&self) -> Self {
        Self {
            id: String::new(),
            owner: None,
            created_at: None,
            updated_at: None,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.owner.as_deref() == Some(GUEST_OWNER)
    }

    /// Per-meal entries, falling back to the legacy lunch-only list.
    #[must_use]
    pub fn resolved_meals(&self) -> PlanMeals {
        match &self.meals {
            Some(meals) => meals.clone(),
            None => PlanMeals {
                lunch: self.ingredients.clone(),
                ..PlanMeals::default()
            },
        }
    }
}

/// Partial plan update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calorie_target: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_percentages: Option<TargetPercentages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_dinner: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meals: Option<PlanMeals>,
}

impl PlanPatch {
    pub fn apply(&self, plan: &mut Plan) {
        if let Some(name) = &self.name {
            plan.name.clone_from(name);
        }
        if let Some(calories) = self.calorie_target {
            plan.calorie_target = calories;
        }
        if let Some(pct) = self.target_percentages {
            plan.target_percentages = pct.canonical();
        }
        if let Some(flag) = self.match_dinner {
            plan.match_dinner = flag;
        }
        if let Some(meals) = &self.meals {
            plan.ingredients.clone_from(&meals.lunch);
            plan.meals = Some(meals.clone());
        }
    }
}

impl From<&Plan> for PlanPatch {
    fn from(plan: &Plan) -> Self {
        Self {
            name: Some(plan.name.clone()),
            calorie_target: Some(plan.calorie_target),
            target_percentages: Some(plan.target_percentages),
            match_dinner: Some(plan.match_dinner),
            meals: Some(plan.resolved_meals()),
        }
    }
}

/// Default settings a user returns to: targets plus a starting set of meals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    pub calorie_target: i64,
    pub target_percentages: TargetPercentages,
    #[serde(default)]
    pub match_dinner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meals: Option<PlanMeals>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<PlanEntry>,
}

impl Baseline {
    #[must_use]
    pub fn resolved_meals(&self) -> PlanMeals {
        match &self.meals {
            Some(meals) => meals.clone(),
            None => PlanMeals {
                lunch: self.ingredients.clone(),
                ..PlanMeals::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            bail!("Identity must not be empty");
        }
        if id == GUEST_OWNER {
            bail!("'{GUEST_OWNER}' is reserved for local plans");
        }
        Ok(Self(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Gram targets implied by a calorie target and macro split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroTargets {
    pub calories: i64,
    pub percentages: TargetPercentages,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl MacroTargets {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(calories: i64, percentages: TargetPercentages) -> Self {
        let pct = percentages.canonical();
        let cal = calories as f64;
        Self {
            calories,
            percentages: pct,
            protein_g: cal * pct.protein as f64 / 100.0 / 4.0,
            carbs_g: cal * pct.carbs as f64 / 100.0 / 4.0,
            fat_g: cal * pct.fat as f64 / 100.0 / 9.0,
        }
    }
}

/// A usage row with its computed macros, for display and export.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryLine {
    pub id: i64,
    pub name: String,
    pub unit: Unit,
    pub quantity: f64,
    pub grams: f64,
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, Serialize)]
pub struct MealGroup {
    pub meal: Meal,
    pub lines: Vec<SummaryLine>,
    pub subtotal: Nutrition,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub meals: Vec<MealGroup>,
    pub total: Nutrition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<MacroTargets>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<MacroValidation>,
}

/// A match returned by an external nutrition search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupCandidate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Nutrition of this exact product, when the provider returned it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<NutritionDetails>,
}

/// Macros for `grams` of a looked-up food.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionDetails {
    pub grams: f64,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl NutritionDetails {
    /// Raw record ready for the normalizer, one serving being `grams`.
    #[must_use]
    pub fn to_raw(&self, name: &str) -> RawIngredient {
        RawIngredient {
            name: Some(Value::from(name)),
            grams_per_unit: Some(Value::from(self.grams)),
            calories: Some(Value::from(self.calories)),
            protein: Some(Value::from(self.protein)),
            carbs: Some(Value::from(self.carbs)),
            fat: Some(Value::from(self.fat)),
            ..RawIngredient::default()
        }
    }
}

/// Display preferences. Guests keep them on the device; signed-in users in
/// the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub show_recent_ingredients: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            show_recent_ingredients: true,
        }
    }
}

const LBS_PER_KG: f64 = 2.204_62;

/// The body profile saved by the calorie calculator. Only the fields the
/// planner reads are modelled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// `"metric"` (kg, the default) or `"imperial"` (lbs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl CalculatorProfile {
    #[must_use]
    pub fn bodyweight_lbs(&self) -> Option<f64> {
        let weight = self.weight.filter(|w| *w > 0.0 && w.is_finite())?;
        match self.units.as_deref() {
            Some("imperial") => Some(weight),
            _ => Some(weight * LBS_PER_KG),
        }
    }
}
