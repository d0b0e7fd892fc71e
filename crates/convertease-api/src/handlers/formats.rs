use crate::error::HttpAppError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::Json;
use convertease_core::models::{normalize_mime, Format, FormatCategory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, IntoParams)]
pub struct FormatsQuery {
    /// Only list targets reachable from this MIME type
    pub source_type: Option<String>,
    /// Case-insensitive search over format labels and categories
    pub q: Option<String>,
}

/// Codes of one category, in table order.
#[derive(Debug, Serialize, ToSchema)]
pub struct FormatGroup {
    pub category: FormatCategory,
    pub codes: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FormatsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    pub formats: Vec<Format>,
    /// The same formats grouped by category, as the picker shows them
    pub groups: Vec<FormatGroup>,
}

fn group_by_category(formats: &[Format]) -> Vec<FormatGroup> {
    let mut groups: Vec<FormatGroup> = Vec::new();
    for format in formats {
        match groups.iter_mut().find(|g| g.category == format.category) {
            Some(group) => group.codes.push(format.code.clone()),
            None => groups.push(FormatGroup {
                category: format.category,
                codes: vec![format.code.clone()],
            }),
        }
    }
    groups
}

#[utoipa::path(
    get,
    path = "/api/v1/formats",
    tag = "formats",
    params(FormatsQuery),
    responses(
        (status = 200, description = "Supported target formats", body = FormatsResponse),
        (status = 400, description = "Malformed query string", body = convertease_infra::ErrorResponse)
    )
)]
pub async fn list_formats(
    State(state): State<Arc<AppState>>,
    query: Result<Query<FormatsQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<FormatsResponse>, HttpAppError> {
    let Query(query) = query?;

    let source_type = query
        .source_type
        .as_deref()
        .map(normalize_mime)
        .filter(|s| !s.is_empty());
    let search = query
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    let candidates: Vec<&Format> = match &source_type {
        Some(source_type) => state.registry.compatible_formats(source_type),
        None => state.registry.list_formats().iter().collect(),
    };
    let formats: Vec<Format> = candidates
        .into_iter()
        .filter(|f| search.as_deref().map_or(true, |q| f.matches_query(q)))
        .cloned()
        .collect();

    Ok(Json(FormatsResponse {
        source_type,
        q: search,
        groups: group_by_category(&formats),
        formats,
    }))
}
