use {
    super::errors::ApiError,
    crate::AppState,
    crate::domain::error::PaymentError,
    crate::services::stats,
    axum::{
        Json,
        extract::{Path, Query, State},
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeParams {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, PaymentError> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| PaymentError::Validation(format!("invalid {field}: {e}")))
        })
        .transpose()
}

pub async fn payment_statistics(
    State(state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let from = parse_date(params.start_date.as_deref(), "startDate")?;
    let to = parse_date(params.end_date.as_deref(), "endDate")?;
    let stats = stats::payment_statistics(state.engine.store(), from, to).await?;
    Ok(Json(serde_json::json!({ "statistics": stats })))
}

pub async fn branch_statistics(
    State(state): State<AppState>,
    Path(branch_id): Path<i64>,
    Query(params): Query<DateRangeParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let from = parse_date(params.start_date.as_deref(), "startDate")?;
    let to = parse_date(params.end_date.as_deref(), "endDate")?;
    let stats = stats::branch_statistics(state.engine.store(), branch_id, from, to).await?;
    Ok(Json(serde_json::json!({ "statistics": stats })))
}

#[derive(Debug, Deserialize)]
pub struct MonthlyParams {
    pub year: i32,
}

pub async fn monthly_statistics(
    State(state): State<AppState>,
    Query(params): Query<MonthlyParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let monthly = stats::monthly_statistics(state.engine.store(), params.year).await?;
    Ok(Json(serde_json::json!({ "monthly": monthly })))
}
