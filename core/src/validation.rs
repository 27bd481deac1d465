//! Range checks on macro targets: protein and fat against bodyweight, fat
//! against its share of calories, carbs against low-carb thresholds and
//! the calorie target itself.

use serde::Serialize;

use crate::models::MacroTargets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
    Success,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Success => "success",
        }
    }
}

/// Lower and upper bounds, each with a critical and a warning level.
struct Bands {
    critical_min: f64,
    warning_min: f64,
    warning_max: f64,
    critical_max: f64,
}

/// Protein, grams per pound of bodyweight.
const PROTEIN_PER_LB: Bands = Bands {
    critical_min: 0.36,
    warning_min: 0.6,
    warning_max: 1.5,
    critical_max: 2.0,
};
const PROTEIN_OPTIMAL_PER_LB: (f64, f64) = (0.8, 1.2);

/// Fat, grams per pound of bodyweight.
const FAT_PER_LB: Bands = Bands {
    critical_min: 0.2,
    warning_min: 0.25,
    warning_max: 0.7,
    critical_max: 1.0,
};

/// Fat, percent of calories.
const FAT_PERCENT: Bands = Bands {
    critical_min: 10.0,
    warning_min: 15.0,
    warning_max: 45.0,
    critical_max: 70.0,
};

const KETO_CARBS_G: f64 = 50.0;
const LOW_CARBS_G: f64 = 100.0;

const CALORIES_CRITICAL_MIN: f64 = 500.0;
const CALORIES_WARNING_MIN: f64 = 800.0;
const CALORIES_CAUTION_LOW: f64 = 1200.0;
const CALORIES_CAUTION_HIGH: f64 = 3500.0;
const CALORIES_WARNING_HIGH: f64 = 5000.0;
const CALORIES_CRITICAL_MAX: f64 = 10000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroCheck {
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Grams per pound of bodyweight, or percent of calories for fat.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}

impl MacroCheck {
    fn new(severity: Severity, message: &str) -> Self {
        Self {
            severity,
            message: Some(message.to_string()),
            recommendation: None,
            ratio: None,
        }
    }

    fn ok() -> Self {
        Self {
            severity: Severity::Success,
            message: None,
            recommendation: None,
            ratio: None,
        }
    }

    fn recommend(mut self, text: String) -> Self {
        self.recommendation = Some(text);
        self
    }

    fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = Some(ratio);
        self
    }
}

#[allow(clippy::cast_possible_truncation)]
fn grams(value: f64) -> i64 {
    value.round() as i64
}

/// `None` when bodyweight is unknown or either value is not positive.
#[must_use]
pub fn validate_protein(protein_g: f64, bodyweight_lbs: f64) -> Option<MacroCheck> {
    if protein_g <= 0.0 || bodyweight_lbs <= 0.0 {
        return None;
    }
    let ratio = protein_g / bodyweight_lbs;
    let (lo, hi) = PROTEIN_OPTIMAL_PER_LB;
    let range = format!(
        "{}-{}g ({lo}-{hi}g/lb)",
        grams(bodyweight_lbs * lo),
        grams(bodyweight_lbs * hi)
    );

    let check = if ratio < PROTEIN_PER_LB.critical_min {
        MacroCheck::new(Severity::Critical, "Protein is critically low")
            .recommend(format!("Increase protein to at least {}g", grams(bodyweight_lbs * lo)))
    } else if ratio < PROTEIN_PER_LB.warning_min {
        MacroCheck::new(Severity::Warning, "Protein is below the range for active people")
            .recommend(format!("Aim for {range}"))
    } else if ratio > PROTEIN_PER_LB.critical_max {
        MacroCheck::new(Severity::Critical, "Protein is extremely high")
            .recommend(format!("Consider reducing to {}g", grams(bodyweight_lbs * hi)))
    } else if ratio > PROTEIN_PER_LB.warning_max {
        MacroCheck::new(Severity::Warning, "Protein is higher than most people need")
            .recommend(format!("{range} is enough for most people"))
    } else {
        MacroCheck::new(Severity::Success, "Protein is in the optimal range")
    };
    Some(check.with_ratio(ratio))
}

#[must_use]
pub fn validate_fat_by_bodyweight(fat_g: f64, bodyweight_lbs: f64) -> Option<MacroCheck> {
    if fat_g <= 0.0 || bodyweight_lbs <= 0.0 {
        return None;
    }
    let ratio = fat_g / bodyweight_lbs;
    Some(fat_check(ratio, &FAT_PER_LB).with_ratio(ratio))
}

#[must_use]
pub fn validate_fat_by_percentage(fat_g: f64, calories: f64) -> Option<MacroCheck> {
    if fat_g <= 0.0 || calories <= 0.0 {
        return None;
    }
    let pct = fat_g * 9.0 / calories * 100.0;
    let check = fat_check(pct, &FAT_PERCENT);
    let check = match check.severity {
        Severity::Critical | Severity::Warning if pct < FAT_PERCENT.warning_min => {
            let floor = calories * FAT_PERCENT.warning_min / 100.0 / 9.0;
            check.recommend(format!("Raise fat to at least {}g", grams(floor)))
        }
        _ => check,
    };
    Some(check.with_ratio(pct))
}

fn fat_check(value: f64, bands: &Bands) -> MacroCheck {
    if value < bands.critical_min {
        MacroCheck::new(Severity::Critical, "Fat is dangerously low")
    } else if value < bands.warning_min {
        MacroCheck::new(Severity::Warning, "Fat is below the minimum for hormonal health")
    } else if value > bands.critical_max {
        MacroCheck::new(Severity::Critical, "Fat is only this high on therapeutic keto diets")
    } else if value > bands.warning_max {
        MacroCheck::new(Severity::Warning, "Fat is high; fine for low-carb goals")
    } else {
        MacroCheck::new(Severity::Success, "Fat is in a healthy range")
    }
}

#[must_use]
pub fn validate_carbs(carbs_g: f64) -> MacroCheck {
    if carbs_g < 0.0 {
        MacroCheck::new(Severity::Critical, "Protein and fat exceed the calorie target")
            .recommend("Reduce protein or fat, or raise the calorie target".to_string())
    } else if carbs_g < KETO_CARBS_G {
        MacroCheck::new(Severity::Info, "Carbs are in the ketogenic range (<50g)")
    } else if carbs_g < LOW_CARBS_G {
        MacroCheck::new(Severity::Info, "Carbs are low (50-100g)")
    } else {
        MacroCheck::ok()
    }
}

#[must_use]
pub fn validate_calories(calories: f64) -> Option<MacroCheck> {
    if calories <= 0.0 {
        return None;
    }
    let check = if calories < CALORIES_CRITICAL_MIN {
        MacroCheck::new(Severity::Critical, "Calories are extremely low")
    } else if calories < CALORIES_WARNING_MIN {
        MacroCheck::new(Severity::Warning, "Calories are quite low")
    } else if calories < CALORIES_CAUTION_LOW {
        MacroCheck::new(Severity::Info, "Calories are on the lower end")
    } else if calories > CALORIES_CRITICAL_MAX {
        MacroCheck::new(Severity::Critical, "Calories are extremely high")
    } else if calories > CALORIES_WARNING_HIGH {
        MacroCheck::new(Severity::Warning, "Calories are very high")
    } else if calories > CALORIES_CAUTION_HIGH {
        MacroCheck::new(Severity::Info, "Calories are quite high")
    } else {
        MacroCheck::ok()
    };
    Some(check)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroValidation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein: Option<MacroCheck>,
    /// Judged by share of calories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat: Option<MacroCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat_by_bodyweight: Option<MacroCheck>,
    pub carbs: MacroCheck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<MacroCheck>,
    pub warnings: usize,
    pub criticals: usize,
}

impl MacroValidation {
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.warnings > 0
    }

    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.criticals > 0
    }

    /// Checks that raised a warning or worse, critical first.
    #[must_use]
    pub fn issues(&self) -> Vec<&MacroCheck> {
        let mut found: Vec<&MacroCheck> = [
            self.protein.as_ref(),
            self.fat.as_ref(),
            Some(&self.carbs),
            self.calories.as_ref(),
        ]
        .into_iter()
        .flatten()
        .filter(|c| matches!(c.severity, Severity::Critical | Severity::Warning))
        .collect();
        found.sort_by_key(|c| c.severity != Severity::Critical);
        found
    }

    /// One line for display.
    #[must_use]
    pub fn summary(&self) -> String {
        let plural = |n: usize, one: &str, many: &str| {
            if n == 1 { one.to_string() } else { many.to_string() }
        };
        if self.has_critical() {
            let n = self.criticals;
            format!("{n} critical {} found", plural(n, "issue", "issues"))
        } else if self.has_warnings() {
            let n = self.warnings;
            format!("{n} {} found", plural(n, "warning", "warnings"))
        } else {
            "All macros within optimal ranges".to_string()
        }
    }
}

/// Check a set of macro targets. Protein and bodyweight-based fat are only
/// judged when `bodyweight_lbs` is known.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn validate_targets(targets: &MacroTargets, bodyweight_lbs: Option<f64>) -> MacroValidation {
    let calories = targets.calories as f64;
    let weight = bodyweight_lbs.unwrap_or(0.0);

    let protein = validate_protein(targets.protein_g, weight);
    let fat = validate_fat_by_percentage(targets.fat_g, calories);
    let fat_by_bodyweight = validate_fat_by_bodyweight(targets.fat_g, weight);
    let carbs = validate_carbs(targets.carbs_g);
    let calories = validate_calories(calories);

    let checks = [protein.as_ref(), fat.as_ref(), Some(&carbs), calories.as_ref()];
    let severities: Vec<Severity> = checks
        .into_iter()
        .flatten()
        .map(|c| c.severity)
        .collect();

    MacroValidation {
        warnings: severities.iter().filter(|s| **s == Severity::Warning).count(),
        criticals: severities.iter().filter(|s| **s == Severity::Critical).count(),
        protein,
        fat,
        fat_by_bodyweight,
        carbs,
        calories,
    }
}
