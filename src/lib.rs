pub mod api_connection;
pub mod cli;
pub mod config;
pub mod fallback_estimator;
pub mod image_input;
pub mod meal_aggregator;
pub mod meal_analyzer;
pub mod nutrient_resolver;
pub mod pipeline;
pub mod response;
pub mod unit_converter;
