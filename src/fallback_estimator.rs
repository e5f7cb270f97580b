use crate::meal_aggregator::{NutritionValues, ResolvedFoodItem};
use crate::meal_analyzer::FoodItem;
use crate::unit_converter::scale_factor;

/// A coarse food group with reference values per 100 g.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoodCategory {
    pub name: &'static str,
    /// Lowercase substrings that put an item in this group. The group name is always one of them.
    pub keywords: &'static [&'static str],
    pub per_100g: NutritionValues,
}

/// Ordered table; the first category with a matching keyword wins.
pub const FOOD_CATEGORIES: &[FoodCategory] = &[
    FoodCategory {
        name: "vegetable",
        keywords: &[
            "vegetable", "broccoli", "carrot", "spinach", "lettuce", "kale", "cabbage",
            "cauliflower", "zucchini", "asparagus", "green bean", "cucumber", "tomato",
            "celery", "mushroom",
        ],
        per_100g: NutritionValues::new(50.0, 2.0, 0.5, 10.0),
    },
    FoodCategory {
        name: "fruit",
        keywords: &[
            "fruit", "apple", "banana", "berry", "berries", "grape", "mango", "melon",
            "pineapple", "peach",
        ],
        per_100g: NutritionValues::new(70.0, 1.0, 0.3, 15.0),
    },
    FoodCategory {
        name: "meat",
        keywords: &[
            "meat", "chicken", "beef", "pork", "steak", "lamb", "turkey", "bacon", "sausage",
        ],
        per_100g: NutritionValues::new(200.0, 25.0, 12.0, 0.0),
    },
    FoodCategory {
        name: "fish",
        keywords: &[
            "fish", "salmon", "tuna", "cod", "shrimp", "tilapia", "trout", "seafood",
        ],
        per_100g: NutritionValues::new(150.0, 20.0, 8.0, 0.0),
    },
    FoodCategory {
        name: "grain",
        keywords: &[
            "grain", "rice", "bread", "pasta", "noodle", "oatmeal", "quinoa", "tortilla",
            "cereal",
        ],
        per_100g: NutritionValues::new(350.0, 10.0, 2.0, 70.0),
    },
    FoodCategory {
        name: "dairy",
        keywords: &["dairy", "milk", "cheese", "yogurt", "yoghurt"],
        per_100g: NutritionValues::new(150.0, 10.0, 8.0, 12.0),
    },
    FoodCategory {
        name: "dessert",
        keywords: &[
            "dessert", "cake", "cookie", "ice cream", "chocolate", "brownie", "pastry", "donut",
        ],
        per_100g: NutritionValues::new(400.0, 5.0, 15.0, 60.0),
    },
];

pub static DEFAULT_CATEGORY: FoodCategory = FoodCategory {
    name: "default",
    keywords: &[],
    per_100g: NutritionValues::new(150.0, 5.0, 5.0, 20.0),
};

/// Picks the category for a free-text name and description.
pub fn categorize(name: &str, description: &str) -> &'static FoodCategory {
    let text = format!("{} {}", name, description).to_lowercase();
    FOOD_CATEGORIES
        .iter()
        .find(|category| category.keywords.iter().any(|kw| text.contains(kw)))
        .unwrap_or(&DEFAULT_CATEGORY)
}

/// Heuristic nutrition for an item with no database match. Always flagged as estimated.
pub fn estimate(item: &FoodItem) -> ResolvedFoodItem {
    let category = categorize(&item.name, &item.description);
    let nutrition = category
        .per_100g
        .scaled(scale_factor(item.quantity, &item.unit))
        .rounded();
    ResolvedFoodItem::from_item(item, nutrition, true, None)
}
