//! Plaintext wire codec
//!
//! Requests are a bracketed, comma-separated list of numbers such as
//! `[1.0,2.5,3.0]`. Responses are the decimal rendering of one scalar, or
//! `error: <reason>` when the request could not be answered.

use crate::service::{FeatureVector, Prediction};
use predictloop_common::{PredictLoopError, Result};

/// Prefix that marks a response as a failure
pub const ERROR_PREFIX: &str = "error:";

/// Parse a request message into a feature vector
///
/// Grammar: `"[" number ("," number)* "]"`, with optional whitespace around
/// the brackets and each number. Non-finite values are rejected.
pub fn decode_request(message: &str) -> Result<FeatureVector> {
    let body = message
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            PredictLoopError::decode("expected a bracketed list such as [1.0,2.0]")
        })?;

    if body.trim().is_empty() {
        return Err(PredictLoopError::decode("feature list is empty"));
    }

    let values = body
        .split(',')
        .enumerate()
        .map(|(position, token)| parse_number(position, token))
        .collect::<Result<Vec<f64>>>()?;

    Ok(FeatureVector::new(values))
}

fn parse_number(position: usize, token: &str) -> Result<f64> {
    let token = token.trim();
    if token.is_empty() {
        return Err(PredictLoopError::decode(format!(
            "missing value at position {}",
            position
        )));
    }

    let value: f64 = token.parse().map_err(|_| {
        PredictLoopError::decode(format!("invalid number {:?} at position {}", token, position))
    })?;

    if !value.is_finite() {
        return Err(PredictLoopError::decode(format!(
            "non-finite value {:?} at position {}",
            token, position
        )));
    }

    Ok(value)
}

/// Render a prediction as its shortest round-tripping decimal text
pub fn encode_prediction(prediction: Prediction) -> String {
    // Debug keeps a fractional part for integral values ("4.0", not "4").
    format!("{:?}", prediction.value())
}

/// Render a per-request failure
pub fn encode_error(err: &PredictLoopError) -> String {
    format!("{} {}", ERROR_PREFIX, err)
}

/// Whether a response message reports a failure
pub fn is_error_response(message: &str) -> bool {
    message.starts_with(ERROR_PREFIX)
}
