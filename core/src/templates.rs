//! Meal templates: named ingredient combinations that can be dropped into a
//! meal in one step. A fixed set ships with the planner; users can save
//! their own on the device.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::library::IngredientLibrary;
use crate::meals::IngredientUsage;
use crate::models::{Meal, Unit};

/// One ingredient of a template, matched to the library by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateItem {
    pub name: String,
    pub quantity: f64,
    pub grams_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub meal: Meal,
    pub items: Vec<TemplateItem>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// The outcome of placing a template against a library.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedTemplate {
    pub usages: Vec<IngredientUsage>,
    /// Item names with no library ingredient of the same name.
    pub missing: Vec<String>,
}

fn item(name: &str, quantity: f64, grams_per_unit: f64) -> TemplateItem {
    TemplateItem {
        name: name.to_string(),
        quantity,
        grams_per_unit,
    }
}

fn template(
    id: &str,
    name: &str,
    description: &str,
    meal: Meal,
    items: Vec<TemplateItem>,
) -> MealTemplate {
    MealTemplate {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        meal,
        items,
        is_custom: false,
        created_at: None,
    }
}

#[must_use]
pub fn predefined_templates() -> Vec<MealTemplate> {
    vec![
        template(
            "oatmeal-basic",
            "Classic Oatmeal",
            "Oats with banana and almond butter",
            Meal::Breakfast,
            vec![
                item("oats", 1.0, 40.0),
                item("banana", 1.0, 118.0),
                item("almond butter", 1.0, 16.0),
            ],
        ),
        template(
            "eggs-toast",
            "Eggs & Toast",
            "Scrambled eggs with whole wheat toast",
            Meal::Breakfast,
            vec![
                item("eggs", 3.0, 50.0),
                item("whole wheat bread", 2.0, 28.0),
                item("butter", 1.0, 14.0),
            ],
        ),
        template(
            "protein-smoothie",
            "Protein Smoothie",
            "Protein powder with fruits",
            Meal::Breakfast,
            vec![
                item("protein powder", 1.0, 30.0),
                item("banana", 1.0, 118.0),
                item("strawberries", 1.0, 150.0),
                item("almond milk", 1.0, 240.0),
            ],
        ),
        template(
            "greek-yogurt-bowl",
            "Greek Yogurt Bowl",
            "Yogurt with granola and berries",
            Meal::Breakfast,
            vec![
                item("greek yogurt", 1.0, 170.0),
                item("granola", 1.0, 30.0),
                item("blueberries", 1.0, 75.0),
                item("honey", 1.0, 21.0),
            ],
        ),
        template(
            "chicken-rice",
            "Chicken & Rice",
            "Grilled chicken with rice and vegetables",
            Meal::Lunch,
            vec![
                item("chicken breast", 1.0, 120.0),
                item("white rice", 1.0, 50.0),
                item("broccoli", 1.0, 91.0),
                item("olive oil", 1.0, 14.0),
            ],
        ),
        template(
            "salmon-quinoa",
            "Salmon & Quinoa",
            "Baked salmon with quinoa and asparagus",
            Meal::Lunch,
            vec![
                item("salmon", 1.0, 120.0),
                item("quinoa", 1.0, 50.0),
                item("asparagus", 1.0, 134.0),
                item("lemon", 1.0, 58.0),
            ],
        ),
        template(
            "turkey-sandwich",
            "Turkey Sandwich",
            "Turkey sandwich with veggies",
            Meal::Lunch,
            vec![
                item("turkey breast", 3.0, 28.0),
                item("whole wheat bread", 2.0, 28.0),
                item("lettuce", 1.0, 36.0),
                item("tomato", 1.0, 123.0),
                item("mustard", 1.0, 15.0),
            ],
        ),
        template(
            "steak-potato",
            "Steak & Potatoes",
            "Lean steak with sweet potato",
            Meal::Dinner,
            vec![
                item("sirloin steak", 1.0, 120.0),
                item("sweet potato", 1.0, 130.0),
                item("green beans", 1.0, 100.0),
            ],
        ),
        template(
            "pasta-bolognese",
            "Pasta Bolognese",
            "Whole wheat pasta with meat sauce",
            Meal::Dinner,
            vec![
                item("whole wheat pasta", 1.0, 56.0),
                item("ground beef", 1.0, 85.0),
                item("tomato sauce", 1.0, 125.0),
                item("parmesan cheese", 1.0, 5.0),
            ],
        ),
        template(
            "chicken-stir-fry",
            "Chicken Stir-Fry",
            "Chicken with mixed vegetables",
            Meal::Dinner,
            vec![
                item("chicken breast", 1.0, 120.0),
                item("mixed vegetables", 1.0, 150.0),
                item("soy sauce", 1.0, 18.0),
                item("sesame oil", 1.0, 14.0),
            ],
        ),
        template(
            "protein-bar",
            "Protein Bar",
            "Quick protein snack",
            Meal::Snack,
            vec![item("protein bar", 1.0, 60.0)],
        ),
        template(
            "apple-peanut-butter",
            "Apple & Peanut Butter",
            "Sliced apple with peanut butter",
            Meal::Snack,
            vec![
                item("apple", 1.0, 182.0),
                item("peanut butter", 2.0, 16.0),
            ],
        ),
        template(
            "nuts-dried-fruit",
            "Trail Mix",
            "Mixed nuts and dried fruit",
            Meal::Snack,
            vec![
                item("almonds", 1.0, 28.0),
                item("raisins", 1.0, 40.0),
            ],
        ),
    ]
}

/// Predefined templates for `meal` followed by the matching custom ones.
#[must_use]
pub fn templates_for(meal: Meal, custom: &[MealTemplate]) -> Vec<MealTemplate> {
    predefined_templates()
        .into_iter()
        .chain(custom.iter().cloned())
        .filter(|t| t.meal == meal)
        .collect()
}

/// Find a template by id among the predefined and `custom` ones.
#[must_use]
pub fn find_template(id: &str, custom: &[MealTemplate]) -> Option<MealTemplate> {
    predefined_templates()
        .into_iter()
        .chain(custom.iter().cloned())
        .find(|t| t.id == id)
}

/// Match template items to library ingredients by name, ignoring case.
/// Mass-based matches keep the template's weight (`quantity *
/// grams_per_unit`); count-based matches keep its count.
#[must_use]
pub fn apply_template(template: &MealTemplate, library: &IngredientLibrary) -> AppliedTemplate {
    let mut applied = AppliedTemplate::default();
    for item in &template.items {
        let wanted = item.name.trim().to_lowercase();
        let Some(base) = library.iter().find(|b| b.name.trim().to_lowercase() == wanted) else {
            applied.missing.push(item.name.clone());
            continue;
        };
        let gpu = base.grams_per_unit;
        let (quantity, grams) = match base.unit {
            Unit::Grams => {
                let grams = item.quantity * item.grams_per_unit;
                (grams / gpu, grams)
            }
            Unit::Count => (item.quantity, item.quantity * gpu),
        };
        applied.usages.push(IngredientUsage {
            quantity,
            grams,
            ..IngredientUsage::from_base(base)
        });
    }
    applied
}

/// Capture the usages of one meal as a custom template. `id` and
/// `created_at` are assigned when it is stored.
pub fn template_from_usages(
    name: &str,
    description: &str,
    meal: Meal,
    usages: &[IngredientUsage],
) -> Result<MealTemplate> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Template name must not be empty");
    }
    if usages.is_empty() {
        bail!("{meal} is empty; add ingredients before saving a template");
    }
    let items = usages
        .iter()
        .map(|u| TemplateItem {
            name: u.name.clone(),
            quantity: u.quantity,
            grams_per_unit: u.grams_per_unit,
        })
        .collect();
    Ok(MealTemplate {
        id: String::new(),
        name: name.to_string(),
        description: description.trim().to_string(),
        meal,
        items,
        is_custom: true,
        created_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BaseIngredient;
    use crate::normalize::normalize_json;

    fn library() -> IngredientLibrary {
        let egg: BaseIngredient = normalize_json(serde_json::json!({
            "id": 1000, "name": "Eggs", "unit": "unit", "gramsPerUnit": 50, "calories": 72
        }));
        IngredientLibrary::with_standard(vec![egg])
    }

    #[test]
    fn test_predefined_ids_unique() {
        let all = predefined_templates();
        let mut ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), all.len());
        assert!(Meal::ALL.iter().all(|m| !templates_for(*m, &[]).is_empty()));
    }

    #[test]
    fn test_apply_matches_by_name() {
        let t = find_template("chicken-rice", &[]).unwrap();
        let applied = apply_template(&t, &library());
        assert!(applied.missing.is_empty());
        assert_eq!(applied.usages.len(), 4);

        let chicken = &applied.usages[0];
        assert_eq!(chicken.id, 1);
        assert!((chicken.grams - 120.0).abs() < 0.01);
        assert!((chicken.quantity - 1.2).abs() < 0.01);
        for u in &applied.usages {
            assert!((u.grams - u.quantity * u.grams_per_unit).abs() < 0.01);
        }
    }

    #[test]
    fn test_apply_reports_missing_and_keeps_counts() {
        let t = find_template("eggs-toast", &[]).unwrap();
        let applied = apply_template(&t, &library());
        assert_eq!(applied.usages.len(), 1);
        assert!((applied.usages[0].quantity - 3.0).abs() < 0.01);
        assert!((applied.usages[0].grams - 150.0).abs() < 0.01);
        assert_eq!(applied.missing, vec!["whole wheat bread", "butter"]);
    }

    #[test]
    fn test_template_from_usages() {
        let lib = library();
        let usage = IngredientUsage::from_base(lib.get(2).unwrap());
        let t = template_from_usages(" Fish day ", "", Meal::Dinner, &[usage]).unwrap();
        assert!(t.is_custom);
        assert_eq!(t.name, "Fish day");
        assert_eq!(t.items[0].name, "Salmon");
        assert!(template_from_usages("x", "", Meal::Snack, &[]).is_err());
        assert!(template_from_usages(" ", "", Meal::Dinner, &[]).is_err());

        let custom = vec![MealTemplate { id: "custom-1".to_string(), ..t }];
        let dinners = templates_for(Meal::Dinner, &custom);
        assert_eq!(dinners.last().unwrap().id, "custom-1");
        assert!(templates_for(Meal::Lunch, &custom).iter().all(|t| !t.is_custom));
    }
}
