use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::ApiJson;
use crate::auth::Claims;
use crate::errors::{AppError, StoreError, ValidationError};
use crate::ip;
use crate::store::{ExcludedIp, ExclusionStore};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Serialize)]
pub struct TorIpsResponse {
    pub tor_ips: Vec<String>,
}

#[derive(Serialize)]
pub struct FilteredTorIpsResponse {
    pub filtered_tor_ips: Vec<String>,
}

/// Either a single `ip` or a batch in `ips`. A non-empty `ip` wins.
#[derive(Deserialize)]
pub struct ExcludeRequest {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub ips: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct RemoveRequest {
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionStatus {
    Success,
    Error,
}

/// Per-address outcome of an exclusion request.
#[derive(Debug, Serialize)]
pub struct ExclusionResult {
    pub ip: String,
    pub status: ExclusionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExclusionResult {
    fn success(ip: String) -> Self {
        Self {
            ip,
            status: ExclusionStatus::Success,
            error: None,
        }
    }

    fn error(ip: String, error: impl Into<String>) -> Self {
        Self {
            ip,
            status: ExclusionStatus::Error,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
pub struct ExclusionResults {
    pub results: Vec<ExclusionResult>,
}

#[derive(Serialize)]
pub struct ExcludedIpsResponse {
    pub excluded_ips: Vec<ExcludedIp>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/tor-ips - exit node addresses scraped from the configured sources
pub async fn tor_ips(State(state): State<Arc<AppState>>) -> Json<TorIpsResponse> {
    let ips = state.sources.fetch_all().await;
    tracing::info!(count = ips.len(), "exit node addresses returned");

    Json(TorIpsResponse {
        tor_ips: ips.into_iter().collect(),
    })
}

/// GET /api/filtered-tor-ips - scraped addresses minus the exclusion list
pub async fn filtered_tor_ips(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FilteredTorIpsResponse>, AppError> {
    let (scraped, excluded) = tokio::join!(state.sources.fetch_all(), state.store.list());
    let excluded = excluded.map_err(|e| {
        tracing::error!("filtered_tor_ips: loading exclusion list failed: {:?}", e);
        e
    })?;

    let filtered = subtract(scraped, &excluded);
    tracing::info!(
        count = filtered.len(),
        excluded = excluded.len(),
        "filtered exit node addresses returned"
    );

    Ok(Json(FilteredTorIpsResponse {
        filtered_tor_ips: filtered,
    }))
}

/// GET /api/excluded-ips - the exclusion list with insertion times
pub async fn list_excluded_ips(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ExcludedIpsResponse>, AppError> {
    let excluded_ips = state.store.entries().await.map_err(|e| {
        tracing::error!("list_excluded_ips failed: {:?}", e);
        e
    })?;
    Ok(Json(ExcludedIpsResponse { excluded_ips }))
}

/// POST /api/excluded-ips - add one address (`ip`) or a batch (`ips`)
///
/// Every address is validated and inserted on its own; failures are reported
/// per item and never abort the rest of the batch. A malformed single `ip` is
/// rejected with 400 instead.
pub async fn add_excluded_ips(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<ExcludeRequest>,
) -> Result<(StatusCode, Json<ExclusionResults>), AppError> {
    let single = payload.ip.filter(|ip| !ip.is_empty());
    let batch = payload.ips.filter(|ips| !ips.is_empty());

    let results = if let Some(raw) = single {
        let Some(canonical) = ip::canonicalize(&raw) else {
            tracing::warn!(ip = %raw, "invalid IP address format");
            return Err(ValidationError::MalformedIp(raw).into());
        };
        vec![insert_one(state.store.as_ref(), &claims, raw, canonical).await]
    } else if let Some(batch) = batch {
        let mut results = Vec::with_capacity(batch.len());
        for raw in batch {
            let result = match ip::canonicalize(&raw) {
                Some(canonical) => insert_one(state.store.as_ref(), &claims, raw, canonical).await,
                None => {
                    tracing::warn!(ip = %raw, "invalid IP address format");
                    ExclusionResult::error(raw, "Invalid IP address format")
                }
            };
            results.push(result);
        }
        results
    } else {
        tracing::warn!("exclusion request without 'ip' or 'ips'");
        return Err(
            ValidationError::MissingField("No valid data provided. Provide 'ip' or 'ips'.").into(),
        );
    };

    Ok((StatusCode::CREATED, Json(ExclusionResults { results })))
}

/// DELETE /api/excluded-ips - remove one address from the exclusion list
pub async fn remove_excluded_ip(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ApiJson(payload): ApiJson<RemoveRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let raw = payload.ip.filter(|ip| !ip.is_empty()).ok_or_else(|| {
        tracing::warn!("exclusion removal without an IP");
        ValidationError::MissingField("IP address is required")
    })?;

    // stored values are canonical; anything unparseable cannot be present
    let key = ip::canonicalize(&raw).unwrap_or_else(|| raw.clone());

    state.store.delete(&key).await.map_err(|e| {
        match &e {
            StoreError::NotFound(_) => {
                tracing::warn!(ip = %key, "removal of an IP that is not excluded")
            }
            other => tracing::error!(ip = %key, "removing IP failed: {:?}", other),
        }
        e
    })?;

    tracing::info!(ip = %key, by = %claims.username, "IP removed from exclusion list");
    Ok(Json(MessageResponse {
        message: format!("IP {} successfully removed from exclusion list.", raw),
    }))
}

async fn insert_one(
    store: &dyn ExclusionStore,
    claims: &Claims,
    submitted: String,
    canonical: String,
) -> ExclusionResult {
    match store.insert(&canonical).await {
        Ok(()) => {
            tracing::info!(ip = %canonical, by = %claims.username, "IP added to exclusion list");
            ExclusionResult::success(submitted)
        }
        Err(e) => {
            match &e {
                StoreError::DuplicateEntry(_) => {
                    tracing::warn!(ip = %canonical, "IP already on exclusion list")
                }
                other => tracing::error!(ip = %canonical, "adding IP failed: {:?}", other),
            }
            ExclusionResult::error(submitted, e.to_string())
        }
    }
}

/// Scraped addresses that are not excluded, sorted.
pub fn subtract(scraped: BTreeSet<String>, excluded: &HashSet<String>) -> Vec<String> {
    scraped
        .into_iter()
        .filter(|ip| !excluded.contains(ip))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtract_is_set_difference() {
        let scraped: BTreeSet<String> = ["1.1.1.1", "2.2.2.2", "2001:db8::1"]
            .into_iter()
            .map(String::from)
            .collect();
        let excluded: HashSet<String> = ["2.2.2.2", "9.9.9.9"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(subtract(scraped.clone(), &excluded), vec!["1.1.1.1", "2001:db8::1"]);
        assert_eq!(subtract(scraped, &HashSet::new()).len(), 3);
        assert!(subtract(BTreeSet::new(), &excluded).is_empty());
    }

    #[test]
    fn test_result_serialization_omits_empty_error() {
        let ok = serde_json::to_value(ExclusionResult::success("10.0.0.5".into())).unwrap();
        assert_eq!(ok, serde_json::json!({"ip": "10.0.0.5", "status": "success"}));

        let err = serde_json::to_value(ExclusionResult::error("x".into(), "Invalid IP address format"))
            .unwrap();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "Invalid IP address format");
    }
}
