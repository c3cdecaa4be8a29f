use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use super::{ApiError, App, Detail};
use crate::model::{StatisticOutput, Submission};
use crate::service::{self, Outcome};

/// The query parameter that orders search results instead of filtering them.
const ORDER_BY: &str = "order_by";

#[derive(Debug, Serialize, Deserialize)]
pub struct Submitted {
    pub detail: String,
    pub status: Outcome,
}

#[instrument(skip(app))]
pub async fn create(
    State(app): State<App>, Json(submission): Json<Submission>,
) -> Result<(StatusCode, Json<Submitted>), ApiError> {
    let status = service::submit(submission, &app.database).await?;

    let body = Submitted {
        detail: status.message().to_string(),
        status,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(default = "default_order")]
    pub order_by: String,
}

fn default_order() -> String {
    "-date".to_string()
}

#[instrument(skip(app))]
pub async fn get_all(
    State(app): State<App>, Query(params): Query<ListParams>,
) -> Result<Json<Vec<StatisticOutput>>, ApiError> {
    let statistics = service::list(
        params.from_date,
        params.to_date,
        Some(params.order_by.as_str()),
        &app.database,
    )
    .await?;

    Ok(Json(statistics.into_iter().map(Into::into).collect()))
}

#[instrument(skip(app))]
pub async fn search(
    State(app): State<App>, Query(query): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<StatisticOutput>>, ApiError> {
    let mut order_by = None;
    let mut params = Vec::with_capacity(query.len());
    for (reference, value) in query {
        if reference == ORDER_BY {
            order_by = Some(value);
        } else {
            params.push((reference, Value::String(value)));
        }
    }

    let statistics = service::search(params, order_by.as_deref(), &app.database).await?;

    Ok(Json(statistics.into_iter().map(Into::into).collect()))
}

#[instrument(skip(app))]
pub async fn remove(
    State(app): State<App>, Path(date): Path<NaiveDate>,
) -> Result<Json<Detail>, ApiError> {
    service::remove(date, &app.database).await?;
    Ok(Json(Detail::new("Statistic deleted".to_string())))
}

#[instrument(skip(app))]
pub async fn delete_all(State(app): State<App>) -> Result<Json<Detail>, ApiError> {
    service::clear(&app.database).await?;
    Ok(Json(Detail::new("Statistics deleted".to_string())))
}
