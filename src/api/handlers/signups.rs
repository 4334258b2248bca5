use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    classifier::{ClassifiedSignups, ClassifyAt, Mode, PaymentFilter, SignupFilters, StatusFilter, TimeFilter},
    domain::Signup,
    error::{AppError, Result},
    service::CreateBookingRequest,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    mode: Mode,
    /// `all` clears the time filter; absent means the mode's default.
    time: Option<String>,
    #[serde(default)]
    status: StatusFilter,
    #[serde(default)]
    payment: PaymentFilter,
    #[serde(default)]
    search: String,
}

impl ListParams {
    fn into_filters(self) -> Result<SignupFilters> {
        let time = match self.time.as_deref() {
            None => self.mode.default_time_filter(),
            Some("all") => None,
            Some("today") => Some(TimeFilter::Today),
            Some("this_week") => Some(TimeFilter::ThisWeek),
            Some("upcoming") => Some(TimeFilter::Upcoming),
            Some(other) => {
                return Err(AppError::BadRequest(format!("Unknown time filter: {}", other)));
            }
        };

        Ok(SignupFilters {
            mode: self.mode,
            time,
            status: self.status,
            payment: self.payment,
            search: self.search,
        })
    }
}

pub async fn list_grouped(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<ClassifiedSignups>> {
    let filters = params.into_filters()?;
    let classified = state
        .service_context
        .signup_service
        .grouped_signups(org_id, &filters, ClassifyAt::local(Utc::now()))
        .await?;
    Ok(Json(classified))
}

pub async fn create(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Signup>)> {
    let signup = state
        .service_context
        .signup_service
        .create_booking(org_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(signup)))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Signup>> {
    Ok(Json(state.service_context.signup_service.mark_as_paid(id).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Signup>> {
    Ok(Json(state.service_context.signup_service.cancel(id).await?))
}

pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Signup>> {
    Ok(Json(state.service_context.signup_service.cancel_with_refund(id).await?))
}

pub async fn offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Signup>> {
    let signup = state
        .service_context
        .signup_service
        .offer_seat(id, Utc::now())
        .await?;
    Ok(Json(signup))
}

#[derive(Debug, Serialize)]
pub struct ExpireOffersResponse {
    expired: u64,
}

pub async fn expire_offers(State(state): State<AppState>) -> Result<Json<ExpireOffersResponse>> {
    let expired = state
        .service_context
        .signup_service
        .expire_offers(Utc::now())
        .await?;
    Ok(Json(ExpireOffersResponse { expired }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_time_uses_mode_default() {
        let filters = ListParams::default().into_filters().unwrap();
        assert_eq!(filters, SignupFilters::for_mode(Mode::Active));
        assert!(!filters.has_active_filters());
    }

    #[test]
    fn all_clears_time_filter() {
        let params = ListParams {
            time: Some("all".to_string()),
            ..ListParams::default()
        };
        let filters = params.into_filters().unwrap();
        assert_eq!(filters.time, None);
        assert!(filters.has_active_filters());
    }

    #[test]
    fn unknown_time_is_rejected() {
        let params = ListParams {
            time: Some("yesterday".to_string()),
            ..ListParams::default()
        };
        assert!(matches!(params.into_filters(), Err(AppError::BadRequest(_))));
    }
}
