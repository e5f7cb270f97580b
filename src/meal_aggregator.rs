use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use crate::meal_analyzer::{Confidence, FoodItem, MealAnalysis};

pub const ALL_ESTIMATED_NOTE: &str =
    "Nutrition values are estimates based on visual analysis and may not be accurate.";
pub const PARTLY_ESTIMATED_NOTE: &str =
    "Some nutrition values are estimates because no database match was found; they may not be accurate.";

/// Absolute nutrient amounts for one portion (or per 100 g in reference tables).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct NutritionValues {
    pub calories: f64,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
}

impl NutritionValues {
    pub const ZERO: NutritionValues = NutritionValues::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(calories: f64, proteins: f64, fats: f64, carbs: f64) -> Self {
        Self {
            calories,
            proteins,
            fats,
            carbs,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            proteins: self.proteins * factor,
            fats: self.fats * factor,
            carbs: self.carbs * factor,
        }
    }

    /// Rounds every field to one decimal place.
    pub fn rounded(&self) -> Self {
        fn round1(v: f64) -> f64 {
            (v * 10.0).round() / 10.0
        }
        Self {
            calories: round1(self.calories),
            proteins: round1(self.proteins),
            fats: round1(self.fats),
            carbs: round1(self.carbs),
        }
    }
}

impl Add for NutritionValues {
    type Output = NutritionValues;

    fn add(self, rhs: NutritionValues) -> NutritionValues {
        NutritionValues {
            calories: self.calories + rhs.calories,
            proteins: self.proteins + rhs.proteins,
            fats: self.fats + rhs.fats,
            carbs: self.carbs + rhs.carbs,
        }
    }
}

impl AddAssign for NutritionValues {
    fn add_assign(&mut self, rhs: NutritionValues) {
        *self = *self + rhs;
    }
}

/// Record in the nutrient database that a resolved item was matched to.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NutritionSource {
    pub fdc_id: u64,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedFoodItem {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preparation: Option<String>,
    pub quantity: f64,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(flatten)]
    pub nutrition: NutritionValues,
    pub estimated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<NutritionSource>,
}

impl ResolvedFoodItem {
    pub fn from_item(
        item: &FoodItem,
        nutrition: NutritionValues,
        estimated: bool,
        source: Option<NutritionSource>,
    ) -> Self {
        Self {
            name: item.name.clone(),
            description: item.description.clone(),
            preparation: item.preparation.clone(),
            quantity: item.quantity,
            unit: item.unit.clone(),
            confidence: item.confidence,
            nutrition,
            estimated,
            source,
        }
    }
}

/// Final answer for one image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MealResult {
    pub meal_description: String,
    pub plate_size: String,
    pub total_nutrition: NutritionValues,
    pub food_items: Vec<ResolvedFoodItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

pub fn total_nutrition(items: &[ResolvedFoodItem]) -> NutritionValues {
    items
        .iter()
        .fold(NutritionValues::ZERO, |acc, item| acc + item.nutrition)
}

fn advisory_note(items: &[ResolvedFoodItem]) -> Option<String> {
    let estimated = items.iter().filter(|i| i.estimated).count();
    if estimated == 0 {
        None
    } else if estimated == items.len() {
        Some(ALL_ESTIMATED_NOTE.to_string())
    } else {
        Some(PARTLY_ESTIMATED_NOTE.to_string())
    }
}

pub fn build_meal_result(analysis: MealAnalysis, food_items: Vec<ResolvedFoodItem>) -> MealResult {
    MealResult {
        meal_description: analysis.meal_description,
        plate_size: analysis.plate_size,
        total_nutrition: total_nutrition(&food_items),
        note: advisory_note(&food_items),
        food_items,
    }
}
