use anyhow::{Context, Result};
use meal_vision::cli::{parse_args, Cli};
use meal_vision::config::AppConfig;
use meal_vision::image_input::{ImageInput, ImageInputError};
use meal_vision::pipeline::NutritionPipeline;
use meal_vision::response::{AnalysisResponse, ErrorKind};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "meal_vision=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    // stdout is reserved for the JSON result.
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn load_image(cli: &Cli) -> Result<ImageInput, ImageInputError> {
    match (&cli.image, &cli.data_url) {
        (Some(path), _) => ImageInput::from_path(path).await,
        (None, Some(data_url)) => ImageInput::from_data_url(data_url),
        (None, None) => Err(ImageInputError::Empty),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = parse_args();

    let mut config = AppConfig::from_env().context("Failed to load configuration")?;
    if let Some(model) = &cli.model {
        config.vision.model = model.clone();
    }
    if let Some(key) = &cli.usda_key {
        config.nutrient_db.api_key = Some(key.clone());
    }
    if cli.no_lookup {
        config.nutrient_db.api_key = None;
    }
    tracing::debug!(?config, "configuration loaded");

    let pipeline =
        NutritionPipeline::from_config(&config).context("Failed to build HTTP clients")?;

    let response = match load_image(&cli).await {
        Ok(image) => {
            tracing::info!(bytes = image.bytes.len(), media_type = %image.media_type, "image loaded");
            AnalysisResponse::from_result(pipeline.run_image(&image).await)
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not load image");
            AnalysisResponse::failure(e.to_string(), ErrorKind::InvalidInput, None)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize response")?
    );

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
