use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::api_connection::connection::{ApiConnectionError, ChatCompletion};
use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent,
};
use crate::image_input::sniff_media_type;

const DEFAULT_UNIT: &str = "oz";
const DEFAULT_QUANTITY: f64 = 1.0;

pub const MEAL_ANALYSIS_PROMPT: &str = "You are an expert nutritionist and food analyst. Analyze the meal in this photo in three steps.

STEP 1: IDENTIFY ALL FOODS
- List every distinct food item visible in the image.
- Be specific about varieties, cooking methods and visible ingredients.
- Include visible condiments, sauces and toppings.

STEP 2: ESTIMATE PORTION SIZES
- First estimate the diameter of the plate or container in inches.
- Using the plate as a reference, estimate each food's volume (cups, tablespoons) or weight (ounces).
- Take the depth of piled foods such as rice or pasta into account.

STEP 3: DESCRIBE EACH FOOD
- Give the specific food name (\"brown rice\", not \"rice\").
- Give the preparation method when visible (baked, fried, grilled, ...).
- Mention visual cues about ingredients such as seasonings or oils.

Reply with a single JSON object of exactly this shape:
{
  \"plate_size\": \"estimated diameter in inches\",
  \"food_items\": [
    {
      \"name\": \"specific food name\",
      \"description\": \"detailed description\",
      \"preparation\": \"cooking method if identifiable\",
      \"quantity\": 1.5,
      \"unit\": \"oz, cups, tbsp, tsp or g\",
      \"confidence\": \"high, medium or low\"
    }
  ],
  \"meal_description\": \"brief overall description of the meal\"
}
\"quantity\" must be a number. Be as precise as possible in identification and measurement.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("vision inference call failed: {0}")]
    UpstreamFailure(#[from] ApiConnectionError),
    #[error("could not parse the model reply as meal JSON: {reason}")]
    UnparsableResponse {
        raw_response: String,
        reason: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Confidence::High),
            "medium" => Some(Confidence::Medium),
            "low" => Some(Confidence::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FoodItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub preparation: Option<String>,
    #[serde(default = "default_quantity", deserialize_with = "lenient_quantity")]
    pub quantity: f64,
    #[serde(default = "default_unit", deserialize_with = "lenient_unit")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: Option<Confidence>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MealAnalysis {
    #[serde(default, deserialize_with = "lenient_string")]
    pub plate_size: String,
    #[serde(default)]
    pub food_items: Vec<FoodItem>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub meal_description: String,
}

fn default_quantity() -> f64 {
    DEFAULT_QUANTITY
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?))
}

fn lenient_unit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(deserializer)?).unwrap_or_else(default_unit))
}

fn lenient_confidence<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Confidence>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Confidence::parse(&s),
        _ => None,
    })
}

fn lenient_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(DEFAULT_QUANTITY),
        Value::String(s) => parse_quantity(&s).unwrap_or(DEFAULT_QUANTITY),
        _ => DEFAULT_QUANTITY,
    })
}

/// Reads "2", "1.5", "1/2" or "1 1/2".
pub fn parse_quantity(text: &str) -> Option<f64> {
    let text = text.trim();
    // f64 parsing also accepts "NaN" and "inf"; those are not quantities.
    if let Ok(v) = text.parse::<f64>() {
        return v.is_finite().then_some(v);
    }

    fn fraction(part: &str) -> Option<f64> {
        let (num, den) = part.split_once('/')?;
        let num = num.trim().parse::<f64>().ok()?;
        let den = den.trim().parse::<f64>().ok()?;
        if den == 0.0 {
            None
        } else {
            Some(num / den)
        }
    }

    match text.split_once(' ') {
        Some((whole, rest)) if rest.contains('/') => {
            Some(whole.trim().parse::<f64>().ok()? + fraction(rest)?).filter(|v| v.is_finite())
        }
        _ => fraction(text).filter(|v| v.is_finite()),
    }
}

/// Pulls a `MealAnalysis` out of free-form model text.
///
/// Tries the span from the first `{` to the last `}` first, then the whole
/// reply. The raw text is handed back on failure.
pub fn extract_meal_analysis(response_text: &str) -> Result<MealAnalysis, AnalysisError> {
    let mut reason = None;

    if let (Some(start), Some(end)) = (response_text.find('{'), response_text.rfind('}')) {
        if start < end {
            match serde_json::from_str::<MealAnalysis>(&response_text[start..=end]) {
                Ok(analysis) => return Ok(analysis),
                Err(e) => {
                    debug!(error = %e, "braced span is not meal JSON, trying whole reply");
                    reason = Some(e.to_string());
                }
            }
        }
    }

    serde_json::from_str::<MealAnalysis>(response_text).map_err(|e| {
        AnalysisError::UnparsableResponse {
            raw_response: response_text.to_string(),
            reason: reason.unwrap_or_else(|| e.to_string()),
        }
    })
}

pub fn image_data_url(image_bytes: &[u8], media_type: &str) -> String {
    format!(
        "data:{};base64,{}",
        media_type,
        general_purpose::STANDARD.encode(image_bytes)
    )
}

/// Turns a meal photo into a list of foods using a vision-capable chat model.
#[derive(Clone)]
pub struct MealAnalyzer {
    client: Arc<dyn ChatCompletion>,
    model: String,
    max_tokens: u32,
}

impl MealAnalyzer {
    pub fn new(client: Arc<dyn ChatCompletion>, model: &str, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            max_tokens,
        }
    }

    fn build_request(&self, image_bytes: &[u8], media_type: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: MEAL_ANALYSIS_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_data_url(image_bytes, media_type),
                        },
                    },
                ]),
            }],
            temperature: None,
            max_tokens: Some(self.max_tokens),
        }
    }

    /// Sends the photo with a media type detected from its magic bytes.
    pub async fn analyze(&self, image_bytes: &[u8]) -> Result<MealAnalysis, AnalysisError> {
        self.analyze_as(image_bytes, sniff_media_type(image_bytes)).await
    }

    /// Sends the photo labelled with a caller-supplied media type.
    #[instrument(skip(self, image_bytes), fields(image_len = image_bytes.len(), model = %self.model))]
    pub async fn analyze_as(
        &self,
        image_bytes: &[u8],
        media_type: &str,
    ) -> Result<MealAnalysis, AnalysisError> {
        let request = self.build_request(image_bytes, media_type);
        let response = self.client.call_chat_completion(request).await?;

        let content = response
            .first_content()
            .ok_or(ApiConnectionError::EmptyCompletion)?;
        debug!(chars = content.len(), "vision reply received");

        extract_meal_analysis(content).inspect_err(|e| {
            warn!(error = %e, "model reply was not usable meal JSON");
        })
    }
}
