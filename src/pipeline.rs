use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument};

use crate::api_connection::connection::{ApiConnectionError, VisionProvider};
use crate::config::AppConfig;
use crate::image_input::ImageInput;
use crate::meal_aggregator::{build_meal_result, MealResult};
use crate::meal_analyzer::{AnalysisError, MealAnalysis, MealAnalyzer};
use crate::nutrient_resolver::NutrientResolver;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Photo in, nutrition breakdown out. Holds no per-request state.
#[derive(Clone)]
pub struct NutritionPipeline {
    analyzer: MealAnalyzer,
    resolver: NutrientResolver,
}

impl NutritionPipeline {
    pub fn new(analyzer: MealAnalyzer, resolver: NutrientResolver) -> Self {
        Self { analyzer, resolver }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApiConnectionError> {
        let provider = VisionProvider::new(
            &config.vision.api_key,
            &config.vision.base_url,
            config.http_timeout,
        )?;
        let analyzer = MealAnalyzer::new(
            Arc::new(provider),
            &config.vision.model,
            config.vision.max_tokens,
        );
        let resolver = NutrientResolver::from_api_key(
            config.nutrient_db.api_key.as_deref(),
            &config.nutrient_db.base_url,
            config.http_timeout,
        )?;
        Ok(Self::new(analyzer, resolver))
    }

    #[instrument(skip(self, image_bytes), fields(image_len = image_bytes.len()))]
    pub async fn run(&self, image_bytes: &[u8]) -> Result<MealResult, PipelineError> {
        let analysis = self.analyzer.analyze(image_bytes).await?;
        Ok(self.resolve_analysis(analysis).await)
    }

    /// Like `run`, but keeps the media type the image was declared with.
    #[instrument(skip(self, image), fields(image_len = image.bytes.len(), media_type = %image.media_type))]
    pub async fn run_image(&self, image: &ImageInput) -> Result<MealResult, PipelineError> {
        let analysis = self
            .analyzer
            .analyze_as(&image.bytes, &image.media_type)
            .await?;
        Ok(self.resolve_analysis(analysis).await)
    }

    async fn resolve_analysis(&self, mut analysis: MealAnalysis) -> MealResult {
        let food_items = std::mem::take(&mut analysis.food_items);

        let resolved = self.resolver.resolve_batch(&food_items).await;
        let result = build_meal_result(analysis, resolved);

        info!(
            items = result.food_items.len(),
            estimated = result.food_items.iter().filter(|i| i.estimated).count(),
            calories = result.total_nutrition.calories,
            "meal analysed"
        );
        result
    }
}
