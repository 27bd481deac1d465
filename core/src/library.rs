use std::collections::HashMap;

use crate::models::{BaseIngredient, CUSTOM_ID_START, Unit};
use crate::normalize::default_serving_sizes;
use crate::nutrition::IngredientLookup;

fn standard(
    id: i64,
    name: &str,
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
) -> BaseIngredient {
    BaseIngredient {
        id,
        name: name.to_string(),
        unit: Unit::Grams,
        grams_per_unit: 100.0,
        grams: 100.0,
        quantity: 1.0,
        calories,
        protein,
        carbs,
        fat,
        serving_sizes: default_serving_sizes(Unit::Grams, 100.0),
    }
}

/// Built-in ingredients, values per 100 g.
#[must_use]
pub fn standard_ingredients() -> Vec<BaseIngredient> {
    vec![
        standard(1, "Chicken breast", 120.0, 22.5, 0.0, 2.5),
        standard(2, "Salmon", 206.0, 20.4, 0.0, 13.0),
        standard(3, "White rice", 365.3, 6.7, 80.0, 0.7),
        standard(4, "Broccoli", 34.1, 2.8, 6.6, 0.4),
        standard(5, "Olive oil", 880.0, 0.0, 0.0, 100.0),
    ]
}

/// Ordered ingredient set with lookup by id. On duplicate ids the first
/// occurrence wins, so standard items shadow any custom item reusing their id.
#[derive(Debug, Clone, Default)]
pub struct IngredientLibrary {
    items: Vec<BaseIngredient>,
    index: HashMap<i64, usize>,
}

impl IngredientLibrary {
    #[must_use]
    pub fn new(items: Vec<BaseIngredient>) -> Self {
        let mut library = Self::default();
        for item in items {
            if library.index.contains_key(&item.id) {
                continue;
            }
            library.index.insert(item.id, library.items.len());
            library.items.push(item);
        }
        library
    }

    /// Standard ingredients followed by `custom`.
    #[must_use]
    pub fn with_standard(custom: Vec<BaseIngredient>) -> Self {
        let mut items = standard_ingredients();
        items.extend(custom);
        Self::new(items)
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<&BaseIngredient> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BaseIngredient> {
        self.items.iter()
    }

    #[must_use]
    pub fn items(&self) -> &[BaseIngredient] {
        &self.items
    }

    pub fn custom(&self) -> impl Iterator<Item = &BaseIngredient> {
        self.items.iter().filter(|i| i.is_custom())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Case-insensitive substring search on names.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&BaseIngredient> {
        let query = query.trim().to_lowercase();
        self.items
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&query))
            .collect()
    }

    /// Lowest id that is free for a new custom ingredient.
    #[must_use]
    pub fn next_custom_id(&self) -> i64 {
        next_custom_id(&self.items)
    }
}

impl IngredientLookup for IngredientLibrary {
    fn base_ingredient(&self, id: i64) -> Option<&BaseIngredient> {
        self.get(id)
    }
}

#[must_use]
pub fn next_custom_id(items: &[BaseIngredient]) -> i64 {
    items
        .iter()
        .map(|i| i.id + 1)
        .max()
        .unwrap_or(CUSTOM_ID_START)
        .max(CUSTOM_ID_START)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(id: i64, name: &str) -> BaseIngredient {
        BaseIngredient {
            name: name.to_string(),
            id,
            ..standard(0, "", 100.0, 10.0, 10.0, 1.0)
        }
    }

    #[test]
    fn test_standard_ids_below_custom_range() {
        let items = standard_ingredients();
        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|i| !i.is_custom()));
        assert_eq!(items[0].name, "Chicken breast");
        assert!((items[4].fat - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_library_lookup() {
        let lib = IngredientLibrary::with_standard(vec![custom(1000, "Oats")]);
        assert_eq!(lib.len(), 6);
        assert_eq!(lib.get(1000).unwrap().name, "Oats");
        assert_eq!(lib.get(3).unwrap().name, "White rice");
        assert!(lib.get(42).is_none());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let lib =
            IngredientLibrary::with_standard(vec![custom(1, "Impostor"), custom(1001, "Tofu")]);
        assert_eq!(lib.get(1).unwrap().name, "Chicken breast");
        assert_eq!(lib.len(), 6);
        assert_eq!(lib.custom().count(), 1);
    }

    #[test]
    fn test_next_custom_id() {
        assert_eq!(IngredientLibrary::with_standard(vec![]).next_custom_id(), 1000);
        let lib = IngredientLibrary::with_standard(vec![custom(1000, "a"), custom(1007, "b")]);
        assert_eq!(lib.next_custom_id(), 1008);
    }

    #[test]
    fn test_search() {
        let lib = IngredientLibrary::with_standard(vec![custom(1000, "Brown rice")]);
        let found = lib.search("RICE");
        assert_eq!(found.len(), 2);
    }
}
