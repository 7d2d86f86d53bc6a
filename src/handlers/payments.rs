//! Payment handlers: order creation and settlement verification.

use axum::{extract::State, Extension, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    auth::jwt::Claims,
    error::{get_db_conn, ApiError, ApiResult},
    models::{NewPayment, Payment},
    payments::{PaymentError, ProductType},
    schema::payments,
    telemetry::record_payment,
    AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    #[schema(example = "promotion_package")]
    pub product_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount_inr: i32,
    pub currency: String,
    /// Public key id for the checkout widget.
    pub key_id: String,
    pub product_type: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    #[schema(example = "promotion_package")]
    pub product_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub verified: bool,
    /// False when the payment row could not be appended after a successful
    /// verification; the discrepancy is logged for manual reconciliation.
    pub recorded: bool,
    pub payment: Option<Payment>,
}

#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    tag = "Payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Gateway order created", body = CreateOrderResponse),
        (status = 400, description = "Unknown product", body = ApiError),
        (status = 502, description = "Gateway failure", body = ApiError),
        (status = 503, description = "Payments not configured", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiResult<Json<CreateOrderResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let product = ProductType::parse(&payload.product_type).ok_or_else(|| {
        ApiError::bad_request(
            format!("Unknown product type: {}", payload.product_type),
            "UNKNOWN_PRODUCT",
        )
    })?;

    // Price is resolved server-side; the client never names an amount.
    let amount_inr = product.price_inr(&state.payments_config);
    let receipt = format!("bb-{}", user_id.simple());

    let order = state
        .payments
        .create_order(amount_inr, &receipt)
        .await
        .map_err(|e| match e {
            PaymentError::NotConfigured => ApiError::service_unavailable(
                "Payments are not available",
                "PAYMENTS_NOT_CONFIGURED",
            ),
            PaymentError::Http(e) => {
                error!(error = %e, "Gateway order request failed");
                ApiError::bad_gateway("Payment gateway request failed", "GATEWAY_ERROR")
            }
            PaymentError::GatewayStatus(status) => {
                error!(status = status, "Gateway rejected order creation");
                ApiError::bad_gateway("Payment gateway request failed", "GATEWAY_ERROR")
            }
        })?;

    let key_id = state.payments.key_id().unwrap_or_default().to_string();

    info!(user_id = %user_id, order_id = %order.id, product = product.as_str(), "Payment order created");

    Ok(Json(CreateOrderResponse {
        order_id: order.id,
        amount_inr,
        currency: order.currency,
        key_id,
        product_type: product.as_str().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/payments/verify",
    tag = "Payments",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Signature verified", body = VerifyPaymentResponse),
        (status = 400, description = "Signature mismatch or unknown product", body = ApiError),
        (status = 503, description = "Payments not configured", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> ApiResult<Json<VerifyPaymentResponse>> {
    let user_id = claims
        .user_id()
        .ok_or_else(|| ApiError::unauthorized("Invalid user ID in token", "INVALID_USER_ID"))?;

    let product = ProductType::parse(&payload.product_type).ok_or_else(|| {
        ApiError::bad_request(
            format!("Unknown product type: {}", payload.product_type),
            "UNKNOWN_PRODUCT",
        )
    })?;

    let verified = state
        .payments
        .verify_signature(
            &payload.razorpay_order_id,
            &payload.razorpay_payment_id,
            &payload.razorpay_signature,
        )
        .map_err(|_| {
            ApiError::service_unavailable("Payments are not available", "PAYMENTS_NOT_CONFIGURED")
        })?;

    if !verified {
        warn!(
            user_id = %user_id,
            order_id = %payload.razorpay_order_id,
            payment_id = %payload.razorpay_payment_id,
            "Payment signature mismatch"
        );
        record_payment(product.as_str(), "failed");
        return Err(ApiError::bad_request(
            "Payment signature verification failed",
            "SIGNATURE_MISMATCH",
        ));
    }

    // The row is appended only after the signature checks out. If the insert
    // fails the gateway has our money and we have no row; that is logged
    // loudly for manual reconciliation rather than retried.
    let amount_inr = product.price_inr(&state.payments_config);
    let new_payment = NewPayment {
        user_id,
        razorpay_order_id: payload.razorpay_order_id.clone(),
        razorpay_payment_id: payload.razorpay_payment_id.clone(),
        amount_inr,
        product_type: product.as_str().to_string(),
        status: "succeeded".to_string(),
    };

    let recorded: Option<Payment> = match get_db_conn(&state.db_pool) {
        Ok(mut conn) => diesel::insert_into(payments::table)
            .values(&new_payment)
            .get_result(&mut conn)
            .map_err(|e| {
                error!(
                    user_id = %user_id,
                    order_id = %payload.razorpay_order_id,
                    payment_id = %payload.razorpay_payment_id,
                    error = %e,
                    "Verified payment could not be recorded; manual reconciliation required"
                );
            })
            .ok(),
        Err(_) => {
            error!(
                user_id = %user_id,
                order_id = %payload.razorpay_order_id,
                payment_id = %payload.razorpay_payment_id,
                "Verified payment could not be recorded (no DB connection); manual reconciliation required"
            );
            None
        }
    };

    record_payment(product.as_str(), "succeeded");

    info!(
        user_id = %user_id,
        order_id = %payload.razorpay_order_id,
        recorded = recorded.is_some(),
        "Payment verified"
    );

    Ok(Json(VerifyPaymentResponse {
        verified: true,
        recorded: recorded.is_some(),
        payment: recorded,
    }))
}
