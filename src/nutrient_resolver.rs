use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::api_connection::connection::{ApiConnectionError, FoodDatabase, UsdaClient};
use crate::api_connection::endpoints::{SearchFood, SearchNutrient};
use crate::fallback_estimator::estimate;
use crate::meal_aggregator::{NutritionSource, NutritionValues, ResolvedFoodItem};
use crate::meal_analyzer::FoodItem;
use crate::unit_converter::scale_factor;

const ENERGY: &str = "Energy";
const ENERGY_UNIT: &str = "KCAL";
const PROTEIN: &str = "Protein";
const TOTAL_FAT: &str = "Total lipid (fat)";
const CARBS_BY_DIFFERENCE: &str = "Carbohydrate, by difference";

fn nutrient_value(nutrients: &[SearchNutrient], matches: impl Fn(&SearchNutrient) -> bool) -> f64 {
    nutrients
        .iter()
        .find(|n| matches(n))
        .and_then(|n| n.value)
        .unwrap_or(0.0)
}

fn named(n: &SearchNutrient, name: &str) -> bool {
    n.nutrient_name.as_deref() == Some(name)
}

/// Reads the four tracked nutrients (per 100 g) off a search record. Missing ones are 0.
pub fn nutrients_per_100g(food: &SearchFood) -> NutritionValues {
    let nutrients = &food.food_nutrients;
    NutritionValues {
        calories: nutrient_value(nutrients, |n| {
            named(n, ENERGY)
                && n.unit_name
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(ENERGY_UNIT))
        }),
        proteins: nutrient_value(nutrients, |n| named(n, PROTEIN)),
        fats: nutrient_value(nutrients, |n| named(n, TOTAL_FAT)),
        carbs: nutrient_value(nutrients, |n| named(n, CARBS_BY_DIFFERENCE)),
    }
}

/// Resolves food items to nutrition values, preferring the nutrient database and
/// degrading to the category estimator per item.
#[derive(Clone, Default)]
pub struct NutrientResolver {
    database: Option<Arc<dyn FoodDatabase>>,
}

impl NutrientResolver {
    pub fn new(database: Option<Arc<dyn FoodDatabase>>) -> Self {
        Self { database }
    }

    pub fn without_database() -> Self {
        Self { database: None }
    }

    /// Builds a USDA-backed resolver when a key is present, an estimate-only one otherwise.
    pub fn from_api_key(
        api_key: Option<&str>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ApiConnectionError> {
        match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => {
                let client = UsdaClient::new(key, base_url, timeout)?;
                Ok(Self::new(Some(Arc::new(client))))
            }
            None => Ok(Self::without_database()),
        }
    }

    pub fn has_database(&self) -> bool {
        self.database.is_some()
    }

    /// Never fails: lookup problems of any kind turn into an estimate for this item only.
    #[instrument(skip(self, item), fields(food = %item.name))]
    pub async fn resolve(&self, item: &FoodItem) -> ResolvedFoodItem {
        let Some(database) = &self.database else {
            return estimate(item);
        };

        match database.search_best_match(&item.name).await {
            Ok(Some(food)) => {
                let per_100g = nutrients_per_100g(&food);
                let nutrition = per_100g.scaled(scale_factor(item.quantity, &item.unit));
                debug!(fdc_id = food.fdc_id, matched = %food.description, "nutrient database match");
                ResolvedFoodItem::from_item(
                    item,
                    nutrition,
                    false,
                    Some(NutritionSource {
                        fdc_id: food.fdc_id,
                        description: food.description,
                    }),
                )
            }
            Ok(None) => {
                warn!("no nutrient database match; estimating");
                estimate(item)
            }
            Err(e) => {
                warn!(error = %e, "nutrient lookup failed; estimating");
                estimate(item)
            }
        }
    }

    /// Resolves every item in order. Without a database no lookup is attempted.
    pub async fn resolve_batch(&self, items: &[FoodItem]) -> Vec<ResolvedFoodItem> {
        if self.database.is_none() {
            debug!(items = items.len(), "no nutrient database configured; estimating all items");
            return items.iter().map(estimate).collect();
        }

        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            resolved.push(self.resolve(item).await);
        }
        resolved
    }
}
