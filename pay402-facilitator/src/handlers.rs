//! Axum route handlers for the facilitator service.
//!
//! Implements the facilitator HTTP API:
//!
//! - `GET /supported` — list supported payment kinds
//! - `POST /verify` — verify a payment (V1 and V2 bodies coexist)
//! - `POST /settle` — settle a payment (V1 and V2 bodies coexist)
//!
//! The protocol version is detected from `paymentPayload.x402Version`, so a
//! single endpoint pair serves both wire formats. Business rejections return
//! 200 with `isValid: false` / `success: false` bodies — the resource server
//! turns those into 402s — while system failures map to 5xx.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use pay402::facilitator::X402Facilitator;
use pay402::proto::helpers::detect_version;
use pay402::proto::{
    ProtocolError, SettleRequest, SettleRequestV1, SettleResponse, SupportedResponse,
    VerifyRequest, VerifyRequestV1, VerifyResponse,
};
use serde_json::Value;

use crate::error::FacilitatorError;

/// Shared application state for the facilitator service.
pub type FacilitatorState = Arc<X402Facilitator>;

fn payload_version(body: &Value) -> Result<u32, ProtocolError> {
    let payload = body
        .get("paymentPayload")
        .ok_or(ProtocolError::MissingField("paymentPayload"))?;
    detect_version(payload)
}

/// `GET /supported` — Returns the list of supported payment kinds.
pub async fn get_supported(State(fac): State<FacilitatorState>) -> Json<SupportedResponse> {
    Json(fac.get_supported())
}

/// `POST /verify` — Verifies a payment payload.
///
/// # Errors
///
/// Returns 404 if no scheme handler is registered, 400 on malformed input,
/// and 5xx on system failures.
pub async fn post_verify(
    State(fac): State<FacilitatorState>,
    Json(body): Json<Value>,
) -> Result<Json<VerifyResponse>, FacilitatorError> {
    let result = match payload_version(&body)? {
        1 => {
            let request: VerifyRequestV1 = serde_json::from_value(body)?;
            fac.verify_v1(&request.payment_payload, &request.payment_requirements)
                .await?
        }
        _ => {
            let request: VerifyRequest = serde_json::from_value(body)?;
            fac.verify(&request.payment_payload, &request.payment_requirements)
                .await?
        }
    };
    Ok(Json(result))
}

/// `POST /settle` — Settles a payment on-chain.
///
/// # Errors
///
/// Returns 404 if no scheme handler is registered, 400 on malformed input,
/// and 5xx on system failures.
pub async fn post_settle(
    State(fac): State<FacilitatorState>,
    Json(body): Json<Value>,
) -> Result<Json<SettleResponse>, FacilitatorError> {
    let result = match payload_version(&body)? {
        1 => {
            let request: SettleRequestV1 = serde_json::from_value(body)?;
            fac.settle_v1(&request.payment_payload, &request.payment_requirements)
                .await?
        }
        _ => {
            let request: SettleRequest = serde_json::from_value(body)?;
            fac.settle(&request.payment_payload, &request.payment_requirements)
                .await?
        }
    };
    Ok(Json(result))
}

/// Health check endpoint.
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates an Axum [`axum::Router`] with all facilitator endpoints.
pub fn facilitator_router(state: FacilitatorState) -> axum::Router {
    axum::Router::new()
        .route("/supported", axum::routing::get(get_supported))
        .route("/verify", axum::routing::post(post_verify))
        .route("/settle", axum::routing::post(post_settle))
        .route("/health", axum::routing::get(health))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_version_detection() {
        let v2 = serde_json::json!({"paymentPayload": {"x402Version": 2}});
        assert_eq!(payload_version(&v2).unwrap(), 2);

        let v1 = serde_json::json!({"paymentPayload": {"x402Version": 1}});
        assert_eq!(payload_version(&v1).unwrap(), 1);

        let missing = serde_json::json!({"paymentRequirements": {}});
        assert!(payload_version(&missing).is_err());
    }
}
