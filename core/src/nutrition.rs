//! Nutrition math. Every displayed or exported macro value goes through
//! [`calculate_nutrition`]; nothing else scales base values.

use std::collections::HashMap;

use crate::meals::MealIngredients;
use crate::models::{
    BaseIngredient, MacroTargets, Meal, MealGroup, Nutrition, PlanEntry, PlanSummary, SummaryLine,
    round_one_decimal,
};

/// Resolves a base ingredient by id.
pub trait IngredientLookup {
    fn base_ingredient(&self, id: i64) -> Option<&BaseIngredient>;
}

impl IngredientLookup for [BaseIngredient] {
    fn base_ingredient(&self, id: i64) -> Option<&BaseIngredient> {
        self.iter().find(|i| i.id == id)
    }
}

impl IngredientLookup for HashMap<i64, BaseIngredient> {
    fn base_ingredient(&self, id: i64) -> Option<&BaseIngredient> {
        self.get(&id)
    }
}

/// Anything that names an ingredient and an amount of it.
pub trait Portion {
    fn ingredient_id(&self) -> i64;
    fn quantity(&self) -> Option<f64>;
    fn grams(&self) -> Option<f64>;
}

impl Portion for PlanEntry {
    fn ingredient_id(&self) -> i64 {
        self.id
    }

    fn quantity(&self) -> Option<f64> {
        self.quantity
    }

    fn grams(&self) -> Option<f64> {
        self.grams
    }
}

/// Number of reference servings a portion represents. Prefers the explicit
/// quantity; legacy portions carrying only grams derive it from the base.
#[must_use]
pub fn resolve_quantity<P: Portion + ?Sized>(portion: &P, base: &BaseIngredient) -> f64 {
    let quantity = portion
        .quantity()
        .filter(|q| q.is_finite())
        .or_else(|| {
            portion
                .grams()
                .filter(|g| g.is_finite())
                .map(|g| g / base.grams_per_unit)
        })
        .unwrap_or(1.0);
    quantity.max(0.0)
}

/// Scaled macros for one portion, each rounded to one decimal place.
/// A portion whose ingredient is gone yields all zeros.
#[must_use]
pub fn calculate_nutrition<P, L>(portion: &P, lookup: &L) -> Nutrition
where
    P: Portion + ?Sized,
    L: IngredientLookup + ?Sized,
{
    let Some(base) = lookup.base_ingredient(portion.ingredient_id()) else {
        return Nutrition::default();
    };
    base.scaled(resolve_quantity(portion, base)).rounded()
}

/// Sum of per-portion values, so totals always match the lines shown.
#[must_use]
pub fn total_nutrition<'a, P, L, I>(portions: I, lookup: &L) -> Nutrition
where
    P: Portion + 'a,
    L: IngredientLookup + ?Sized,
    I: IntoIterator<Item = &'a P>,
{
    portions
        .into_iter()
        .map(|p| calculate_nutrition(p, lookup))
        .sum::<Nutrition>()
        .rounded()
}

/// Per-meal lines and subtotals plus the day total.
#[must_use]
pub fn summarize<L: IngredientLookup + ?Sized>(
    meals: &MealIngredients,
    lookup: &L,
    target: Option<MacroTargets>,
) -> PlanSummary {
    let mut groups = Vec::new();
    let mut total = Nutrition::default();

    for meal in Meal::ALL {
        let lines: Vec<SummaryLine> = meals
            .meal(meal)
            .iter()
            .map(|u| SummaryLine {
                id: u.id,
                name: u.name.clone(),
                unit: u.unit,
                quantity: round_one_decimal(u.quantity),
                grams: round_one_decimal(u.grams),
                nutrition: calculate_nutrition(u, lookup),
            })
            .collect();
        let subtotal = lines
            .iter()
            .map(|l| l.nutrition)
            .sum::<Nutrition>()
            .rounded();
        total += subtotal;
        groups.push(MealGroup {
            meal,
            lines,
            subtotal,
        });
    }

    PlanSummary {
        meals: groups,
        total: total.rounded(),
        target,
        validation: None,
    }
}
