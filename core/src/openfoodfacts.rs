use serde::Deserialize;

use crate::models::{LookupCandidate, NutritionDetails};

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<ProductData>,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    pub brands: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g")]
    pub energy_kcal_100g: Option<f64>,
    pub proteins_100g: Option<f64>,
    pub carbohydrates_100g: Option<f64>,
    pub fat_100g: Option<f64>,
}

#[must_use]
pub fn product_to_candidate(p: &ProductData) -> Option<LookupCandidate> {
    let name = p.product_name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    Some(LookupCandidate {
        name: name.to_string(),
        brand: p
            .brands
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string),
        details: product_to_details(p),
    })
}

/// Per-100 g macros. Products without a calorie value are unusable.
#[must_use]
pub fn product_to_details(p: &ProductData) -> Option<NutritionDetails> {
    let nutriments = p.nutriments.as_ref()?;
    let calories = nutriments.energy_kcal_100g?;
    Some(NutritionDetails {
        grams: 100.0,
        calories,
        protein: nutriments.proteins_100g.unwrap_or(0.0),
        carbs: nutriments.carbohydrates_100g.unwrap_or(0.0),
        fat: nutriments.fat_100g.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_product() -> ProductData {
        ProductData {
            product_name: Some("Greek Yogurt".to_string()),
            brands: Some("Fage".to_string()),
            nutriments: Some(Nutriments {
                energy_kcal_100g: Some(97.0),
                proteins_100g: Some(9.0),
                carbohydrates_100g: Some(3.9),
                fat_100g: Some(5.0),
            }),
        }
    }

    #[test]
    fn test_product_to_candidate() {
        let c = product_to_candidate(&full_product()).unwrap();
        assert_eq!(c.name, "Greek Yogurt");
        assert_eq!(c.brand.as_deref(), Some("Fage"));
        let details = c.details.unwrap();
        assert!((details.calories - 97.0).abs() < 0.01);
        assert!((details.protein - 9.0).abs() < 0.01);
    }

    #[test]
    fn test_product_to_candidate_missing_name() {
        let mut p = full_product();
        p.product_name = None;
        assert!(product_to_candidate(&p).is_none());

        p.product_name = Some("  ".to_string());
        assert!(product_to_candidate(&p).is_none());
    }

    #[test]
    fn test_product_to_details() {
        let d = product_to_details(&full_product()).unwrap();
        assert!((d.grams - 100.0).abs() < 0.01);
        assert!((d.calories - 97.0).abs() < 0.01);
        assert!((d.carbs - 3.9).abs() < 0.01);
    }

    #[test]
    fn test_product_to_details_missing_calories() {
        let mut p = full_product();
        p.nutriments.as_mut().unwrap().energy_kcal_100g = None;
        assert!(product_to_details(&p).is_none());

        p.nutriments = None;
        assert!(product_to_details(&p).is_none());
    }

    #[test]
    fn test_product_to_details_partial_macros() {
        let p = ProductData {
            product_name: Some("Plain Oats".to_string()),
            brands: None,
            nutriments: Some(Nutriments {
                energy_kcal_100g: Some(389.0),
                proteins_100g: None,
                carbohydrates_100g: None,
                fat_100g: None,
            }),
        };
        let d = product_to_details(&p).unwrap();
        assert!((d.calories - 389.0).abs() < 0.01);
        assert!(d.protein.abs() < 0.01);
        assert!(product_to_candidate(&p).unwrap().brand.is_none());
    }

    #[test]
    fn test_deserialize_search_response() {
        let json = r#"{"products": [
            {"product_name": "Skyr", "nutriments": {"energy-kcal_100g": 63, "proteins_100g": 11}},
            {"brands": "NoName"}
        ]}"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.products.len(), 2);
        assert!(product_to_details(&resp.products[0]).is_some());
        assert!(product_to_candidate(&resp.products[1]).is_none());
    }
}
