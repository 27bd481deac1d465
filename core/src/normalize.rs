//! The single gate between loosely-typed ingredient records and
//! [`BaseIngredient`]. Never fails: bad values are coerced to defaults.

use serde_json::Value;

use crate::models::{BaseIngredient, DEFAULT_GRAMS_PER_UNIT, RawIngredient, ServingSize, Unit};

pub const UNNAMED_INGREDIENT: &str = "Unnamed ingredient";

/// Parse a JSON number or numeric string. Non-finite and unparseable
/// values yield `None`.
#[must_use]
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn coerce_non_negative(value: Option<&Value>) -> Option<f64> {
    coerce_number(value).map(|n| n.max(0.0))
}

fn coerce_positive(value: Option<&Value>) -> Option<f64> {
    coerce_number(value).filter(|n| *n > 0.0)
}

#[allow(clippy::cast_precision_loss)]
fn coerce_id(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn coerce_name(value: Option<&Value>) -> String {
    let name = match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    if name.is_empty() {
        UNNAMED_INGREDIENT.to_string()
    } else {
        name
    }
}

/// Format a gram amount without a trailing `.0` for whole numbers.
#[must_use]
pub fn format_grams(grams: f64) -> String {
    if grams.fract() == 0.0 {
        format!("{grams:.0}g")
    } else {
        format!("{grams}g")
    }
}

/// Serving sizes for an ingredient that arrived without any.
#[must_use]
pub fn default_serving_sizes(unit: Unit, grams_per_unit: f64) -> Vec<ServingSize> {
    let hundred = ServingSize {
        name: "100g".to_string(),
        grams: 100.0,
        is_default: false,
    };
    match unit {
        Unit::Count => vec![
            ServingSize {
                name: format!("1 unit ({})", format_grams(grams_per_unit)),
                grams: grams_per_unit,
                is_default: true,
            },
            hundred,
        ],
        Unit::Grams if (grams_per_unit - 100.0).abs() < f64::EPSILON => vec![ServingSize {
            is_default: true,
            ..hundred
        }],
        Unit::Grams => vec![
            ServingSize {
                name: format_grams(grams_per_unit),
                grams: grams_per_unit,
                is_default: true,
            },
            hundred,
        ],
    }
}

fn parse_serving_sizes(value: Option<&Value>) -> Vec<ServingSize> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let grams = coerce_positive(item.get("grams"))?;
            let is_default = item
                .get("isDefault")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Some(ServingSize {
                name: name.to_string(),
                grams,
                is_default,
            })
        })
        .collect()
}

/// Coerce a raw record into a canonical [`BaseIngredient`].
///
/// `grams_per_unit` resolves from an explicit positive `gramsPerUnit`, then an
/// explicit positive `grams`, then 100. It is resolved before `grams` is
/// defaulted, since an explicit `grams` of 0 is kept as-is.
#[must_use]
pub fn normalize(raw: &RawIngredient) -> BaseIngredient {
    let unit = match &raw.unit {
        Some(Value::String(s)) => Unit::parse(s),
        _ => Unit::Grams,
    };

    let grams_per_unit = coerce_positive(raw.grams_per_unit.as_ref())
        .or_else(|| coerce_positive(raw.grams.as_ref()))
        .unwrap_or(DEFAULT_GRAMS_PER_UNIT);

    let grams = coerce_non_negative(raw.grams.as_ref()).unwrap_or(grams_per_unit);
    let quantity = coerce_non_negative(raw.quantity.as_ref()).unwrap_or(1.0);

    let mut serving_sizes = parse_serving_sizes(raw.serving_sizes.as_ref());
    if serving_sizes.is_empty() {
        serving_sizes = default_serving_sizes(unit, grams_per_unit);
    }

    BaseIngredient {
        id: coerce_id(raw.id.as_ref()),
        name: coerce_name(raw.name.as_ref()),
        unit,
        grams_per_unit,
        grams,
        quantity,
        calories: coerce_non_negative(raw.calories.as_ref()).unwrap_or(0.0),
        protein: coerce_non_negative(raw.protein.as_ref()).unwrap_or(0.0),
        carbs: coerce_non_negative(raw.carbs.as_ref()).unwrap_or(0.0),
        fat: coerce_non_negative(raw.fat.as_ref()).unwrap_or(0.0),
        serving_sizes,
    }
}

/// Re-run an already-typed ingredient through the normalizer.
#[must_use]
pub fn renormalize(base: &BaseIngredient) -> BaseIngredient {
    normalize(&RawIngredient::from(base))
}

/// Normalize a JSON value of any shape.
#[must_use]
pub fn normalize_json(value: Value) -> BaseIngredient {
    normalize(&RawIngredient::from_json(value))
}
