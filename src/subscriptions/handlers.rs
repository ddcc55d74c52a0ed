use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{extractors::AuthUser, repo::User},
    error::{is_unique_violation, ApiError},
    state::AppState,
};

use super::dto::{SubscribeRequest, SubscriptionResponse, UnsubscribeRequest};
use super::repo::Subscription;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list))
        .route("/subscriptions/:currency", get(list_by_currency))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", post(subscribe))
        .route("/subscriptions", delete(unsubscribe))
}

#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let subs = Subscription::list_for_user(&state.db, user_id).await?;
    Ok(Json(subs.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn list_by_currency(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(currency): Path<String>,
) -> Result<Json<Vec<SubscriptionResponse>>, ApiError> {
    let subs = Subscription::list_for_user_currency(&state.db, user_id, &currency).await?;
    Ok(Json(subs.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, payload))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriptionResponse>), ApiError> {
    if payload.currency.trim().is_empty() {
        return Err(ApiError::Validation("currency is required".into()));
    }
    if payload.address.trim().is_empty() {
        return Err(ApiError::Validation("address is required".into()));
    }

    // The owner can vanish between the guard check and the insert.
    if User::find_by_id(&state.db, user_id).await?.is_none() {
        warn!(user_id = %user_id, "subscribe for deleted user");
        return Err(ApiError::NotFound("user"));
    }

    let sub = match Subscription::create(
        &state.db,
        user_id,
        &payload.currency,
        &payload.address,
        payload.block_height,
        payload.starting_block_height,
    )
    .await
    {
        Ok(s) => s,
        Err(e) if is_unique_violation(&e) => {
            warn!(user_id = %user_id, currency = %payload.currency, "duplicate subscription");
            return Err(ApiError::Conflict("Subscription already exists".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user_id, subscription_id = %sub.id, currency = %sub.currency, "subscribed");
    Ok((StatusCode::CREATED, Json(sub.into())))
}

#[instrument(skip(state, payload))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UnsubscribeRequest>,
) -> Result<StatusCode, ApiError> {
    let deleted =
        Subscription::delete_for_owner(&state.db, user_id, &payload.currency, &payload.address)
            .await?;

    match deleted {
        Some(id) => {
            info!(user_id = %user_id, subscription_id = %id, "unsubscribed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => {
            warn!(user_id = %user_id, currency = %payload.currency, "unsubscribe without a matching row");
            Err(ApiError::NotFound("subscription"))
        }
    }
}
