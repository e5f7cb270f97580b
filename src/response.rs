use serde::Serialize;

use crate::meal_aggregator::MealResult;
use crate::meal_analyzer::AnalysisError;
use crate::pipeline::PipelineError;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UpstreamFailure,
    UnparsableResponse,
    InvalidInput,
}

/// `{"success": true, "data": ..}` or `{"success": false, "error": ..}`.
#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Success {
        success: bool,
        data: MealResult,
    },
    Failure {
        success: bool,
        error: String,
        error_kind: ErrorKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
    },
}

impl AnalysisResponse {
    pub fn success(data: MealResult) -> Self {
        AnalysisResponse::Success {
            success: true,
            data,
        }
    }

    pub fn failure(error: impl Into<String>, error_kind: ErrorKind, raw_response: Option<String>) -> Self {
        AnalysisResponse::Failure {
            success: false,
            error: error.into(),
            error_kind,
            raw_response,
        }
    }

    pub fn from_result(result: Result<MealResult, PipelineError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(PipelineError::Analysis(err)) => {
                let message = err.to_string();
                match err {
                    AnalysisError::UpstreamFailure(_) => {
                        Self::failure(message, ErrorKind::UpstreamFailure, None)
                    }
                    AnalysisError::UnparsableResponse { raw_response, .. } => {
                        Self::failure(message, ErrorKind::UnparsableResponse, Some(raw_response))
                    }
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResponse::Success { .. })
    }
}
