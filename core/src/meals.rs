use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::models::{BaseIngredient, Meal, PlanEntry, PlanMeals, Unit};
use crate::nutrition::{IngredientLookup, Portion, resolve_quantity};

/// An ingredient placed in a meal. `grams == quantity * grams_per_unit`
/// against the base it was last refreshed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientUsage {
    pub id: i64,
    pub name: String,
    pub unit: Unit,
    pub grams_per_unit: f64,
    pub quantity: f64,
    pub grams: f64,
}

impl IngredientUsage {
    /// One reference serving of `base`.
    #[must_use]
    pub fn from_base(base: &BaseIngredient) -> Self {
        Self {
            id: base.id,
            name: base.name.clone(),
            unit: base.unit,
            grams_per_unit: base.grams_per_unit,
            quantity: 1.0,
            grams: base.grams_per_unit,
        }
    }

    /// Rebuild a usage from a saved entry. Entries that carry only grams
    /// derive their quantity.
    #[must_use]
    pub fn from_entry(entry: &PlanEntry, base: &BaseIngredient) -> Self {
        let quantity = resolve_quantity(entry, base);
        Self {
            quantity,
            grams: quantity * base.grams_per_unit,
            ..Self::from_base(base)
        }
    }

    /// Re-pull name, unit and serving weight from the current base. The
    /// amount the user sees is kept: grams for mass-based items, quantity
    /// for count-based ones. The other side is re-derived.
    #[must_use]
    pub fn refreshed(&self, base: &BaseIngredient) -> Self {
        let gpu = base.grams_per_unit;
        let (quantity, grams) = match base.unit {
            Unit::Grams => (self.grams / gpu, self.grams),
            Unit::Count => (self.quantity, self.quantity * gpu),
        };
        Self {
            id: self.id,
            name: base.name.clone(),
            unit: base.unit,
            grams_per_unit: gpu,
            quantity,
            grams,
        }
    }

    #[must_use]
    pub fn to_entry(&self) -> PlanEntry {
        PlanEntry {
            id: self.id,
            grams: Some(self.grams),
            quantity: Some(self.quantity),
        }
    }

    /// The number the user edits: grams or count.
    #[must_use]
    pub fn amount(&self) -> f64 {
        match self.unit {
            Unit::Grams => self.grams,
            Unit::Count => self.quantity,
        }
    }
}

impl Portion for IngredientUsage {
    fn ingredient_id(&self) -> i64 {
        self.id
    }

    fn quantity(&self) -> Option<f64> {
        Some(self.quantity)
    }

    fn grams(&self) -> Option<f64> {
        Some(self.grams)
    }
}

/// Refresh a usage against `lookup`, or return it unchanged if its
/// ingredient is no longer there.
#[must_use]
pub fn refresh_usage<L: IngredientLookup + ?Sized>(
    usage: &IngredientUsage,
    lookup: &L,
) -> IngredientUsage {
    match lookup.base_ingredient(usage.id) {
        Some(base) => usage.refreshed(base),
        None => usage.clone(),
    }
}

/// Usage lists for each meal of a day. Every operation returns a new
/// snapshot and leaves `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealIngredients {
    pub breakfast: Vec<IngredientUsage>,
    pub lunch: Vec<IngredientUsage>,
    pub dinner: Vec<IngredientUsage>,
    pub snack: Vec<IngredientUsage>,
}

impl MealIngredients {
    #[must_use]
    pub fn meal(&self, meal: Meal) -> &[IngredientUsage] {
        match meal {
            Meal::Breakfast => &self.breakfast,
            Meal::Lunch => &self.lunch,
            Meal::Dinner => &self.dinner,
            Meal::Snack => &self.snack,
        }
    }

    fn meal_mut(&mut self, meal: Meal) -> &mut Vec<IngredientUsage> {
        match meal {
            Meal::Breakfast => &mut self.breakfast,
            Meal::Lunch => &mut self.lunch,
            Meal::Dinner => &mut self.dinner,
            Meal::Snack => &mut self.snack,
        }
    }

    /// Copy with `meal` replaced by `items`.
    #[must_use]
    pub fn with_meal(&self, meal: Meal, items: Vec<IngredientUsage>) -> Self {
        let mut next = self.clone();
        *next.meal_mut(meal) = items;
        next
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        Meal::ALL.iter().all(|m| self.meal(*m).is_empty())
    }

    #[must_use]
    pub fn contains(&self, meal: Meal, id: i64) -> bool {
        self.meal(meal).iter().any(|u| u.id == id)
    }

    /// Append one serving of `base`. Adding an ingredient the meal already
    /// holds bumps that usage by one serving instead.
    #[must_use]
    pub fn add_ingredient(&self, meal: Meal, base: &BaseIngredient) -> Self {
        let mut next = self.clone();
        let items = next.meal_mut(meal);
        if let Some(existing) = items.iter_mut().find(|u| u.id == base.id) {
            let quantity = existing.quantity + 1.0;
            *existing = IngredientUsage {
                quantity,
                grams: quantity * base.grams_per_unit,
                ..existing.refreshed(base)
            };
        } else {
            items.push(IngredientUsage::from_base(base));
        }
        next
    }

    /// Append prepared usages in one step. A usage whose ingredient the meal
    /// already holds is added onto that usage.
    #[must_use]
    pub fn add_usages(&self, meal: Meal, usages: &[IngredientUsage]) -> Self {
        let mut next = self.clone();
        let items = next.meal_mut(meal);
        for usage in usages {
            if let Some(existing) = items.iter_mut().find(|u| u.id == usage.id) {
                existing.quantity += usage.quantity;
                existing.grams = existing.quantity * existing.grams_per_unit;
            } else {
                items.push(usage.clone());
            }
        }
        next
    }

    /// Set the amount of ingredient `id` in `meal`. The value is grams for
    /// mass-based usages and a count for count-based ones; the other side is
    /// derived and negatives clamp to 0. Unknown ids leave the meal as is.
    #[must_use]
    pub fn update_amount<L: IngredientLookup + ?Sized>(
        &self,
        meal: Meal,
        id: i64,
        amount: f64,
        lookup: &L,
    ) -> Self {
        let mut next = self.clone();
        for usage in next.meal_mut(meal).iter_mut().filter(|u| u.id == id) {
            let gpu = lookup
                .base_ingredient(id)
                .map_or(usage.grams_per_unit, |b| b.grams_per_unit);
            let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
            let (quantity, grams) = match usage.unit {
                Unit::Grams => (amount / gpu, amount),
                Unit::Count => (amount, amount * gpu),
            };
            usage.grams_per_unit = gpu;
            usage.quantity = quantity;
            usage.grams = grams;
        }
        next
    }

    /// Set ingredient `id` to one of its named serving sizes.
    pub fn update_serving<L: IngredientLookup + ?Sized>(
        &self,
        meal: Meal,
        id: i64,
        serving_name: &str,
        lookup: &L,
    ) -> Result<Self> {
        let Some(base) = lookup.base_ingredient(id) else {
            bail!("Ingredient {id} is not in the library");
        };
        let Some(serving) = base.serving(serving_name) else {
            let names: Vec<&str> = base.serving_sizes.iter().map(|s| s.name.as_str()).collect();
            bail!(
                "Unknown serving '{serving_name}' for {}. Available: {}",
                base.name,
                names.join(", ")
            );
        };
        if !self.contains(meal, id) {
            bail!("{} is not in {meal}", base.name);
        }
        let mut next = self.clone();
        for usage in next.meal_mut(meal).iter_mut().filter(|u| u.id == id) {
            *usage = IngredientUsage {
                quantity: serving.grams / base.grams_per_unit,
                grams: serving.grams,
                ..usage.refreshed(base)
            };
        }
        Ok(next)
    }

    #[must_use]
    pub fn remove_ingredient(&self, meal: Meal, id: i64) -> Self {
        let mut next = self.clone();
        next.meal_mut(meal).retain(|u| u.id != id);
        next
    }

    /// Re-derive every usage from the current library. Orphaned usages are
    /// kept unchanged.
    #[must_use]
    pub fn refresh_against_library<L: IngredientLookup + ?Sized>(&self, lookup: &L) -> Self {
        let refresh = |items: &[IngredientUsage]| -> Vec<IngredientUsage> {
            items.iter().map(|u| refresh_usage(u, lookup)).collect()
        };
        Self {
            breakfast: refresh(&self.breakfast),
            lunch: refresh(&self.lunch),
            dinner: refresh(&self.dinner),
            snack: refresh(&self.snack),
        }
    }

    #[must_use]
    pub fn to_plan_meals(&self) -> PlanMeals {
        let entries =
            |items: &[IngredientUsage]| items.iter().map(IngredientUsage::to_entry).collect();
        PlanMeals {
            breakfast: entries(&self.breakfast),
            lunch: entries(&self.lunch),
            dinner: entries(&self.dinner),
            snack: entries(&self.snack),
        }
    }

    /// Hydrate from saved entries. Entries whose ingredient no longer exists
    /// are dropped.
    #[must_use]
    pub fn from_plan_meals<L: IngredientLookup + ?Sized>(meals: &PlanMeals, lookup: &L) -> Self {
        let usages = |entries: &[PlanEntry]| -> Vec<IngredientUsage> {
            entries
                .iter()
                .filter_map(|e| {
                    lookup
                        .base_ingredient(e.id)
                        .map(|base| IngredientUsage::from_entry(e, base))
                })
                .collect()
        };
        Self {
            breakfast: usages(&meals.breakfast),
            lunch: usages(&meals.lunch),
            dinner: usages(&meals.dinner),
            snack: usages(&meals.snack),
        }
    }
}
