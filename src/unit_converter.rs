// Grams per unit. Volume units use water-like densities, which is rough for most foods.
const GRAMS_PER_OUNCE: f64 = 28.35;
const GRAMS_PER_CUP: f64 = 240.0;
const GRAMS_PER_TABLESPOON: f64 = 15.0;
const GRAMS_PER_TEASPOON: f64 = 5.0;

/// Converts a portion to grams.
///
/// Unit spellings are matched case-insensitively. Anything not recognised is
/// read as ounces, which is what the vision prompt asks for by default, so this
/// never fails. Negative quantities pass straight through.
pub fn to_grams(quantity: f64, unit: &str) -> f64 {
    match unit.trim().to_lowercase().as_str() {
        "g" | "grams" => quantity,
        "oz" | "ounce" | "ounces" => quantity * GRAMS_PER_OUNCE,
        "cup" | "cups" => quantity * GRAMS_PER_CUP,
        "tbsp" | "tablespoon" | "tablespoons" => quantity * GRAMS_PER_TABLESPOON,
        "tsp" | "teaspoon" | "teaspoons" => quantity * GRAMS_PER_TEASPOON,
        _ => quantity * GRAMS_PER_OUNCE,
    }
}

/// Ratio of a portion's mass to the 100 g basis that nutrient tables use.
pub fn scale_factor(quantity: f64, unit: &str) -> f64 {
    to_grams(quantity, unit) / 100.0
}
