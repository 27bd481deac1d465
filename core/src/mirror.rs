//! One-way meal mirroring (lunch into dinner).

use crate::meals::{IngredientUsage, MealIngredients, refresh_usage};
use crate::models::Meal;
use crate::nutrition::IngredientLookup;

pub const MIRROR_SOURCE: Meal = Meal::Lunch;
pub const MIRROR_TARGET: Meal = Meal::Dinner;

/// Copy `source`, passing each usage through `refresh`.
pub fn mirror<F>(source: &[IngredientUsage], refresh: F) -> Vec<IngredientUsage>
where
    F: Fn(&IngredientUsage) -> IngredientUsage,
{
    source.iter().map(refresh).collect()
}

/// Replace dinner with a refreshed copy of lunch.
#[must_use]
pub fn mirror_lunch_into_dinner<L: IngredientLookup + ?Sized>(
    meals: &MealIngredients,
    lookup: &L,
) -> MealIngredients {
    let dinner = mirror(meals.meal(MIRROR_SOURCE), |u| refresh_usage(u, lookup));
    meals.with_meal(MIRROR_TARGET, dinner)
}

/// True when dinner holds the same ingredients in the same amounts as lunch.
#[must_use]
pub fn is_mirrored(meals: &MealIngredients) -> bool {
    let source = meals.meal(MIRROR_SOURCE);
    let target = meals.meal(MIRROR_TARGET);
    source.len() == target.len()
        && source
            .iter()
            .zip(target)
            .all(|(a, b)| a.id == b.id && (a.quantity - b.quantity).abs() < 1e-9)
}
