//! Discovery API request handlers.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Uri, header};
use axum::response::{IntoResponse, Response};
use beacon_registry::{Entry, VirtualNode};
use beacon_types::PeerType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

/// The only representation this API produces.
const JSON_CONTENT_TYPE: &str = "application/json";

/// Header carrying the time spent answering the query, in whole
/// microseconds with a `us` suffix.
pub(crate) const HEADER_DURATION: &str = "x-duration";

/// Header echoing the requested type.
pub(crate) const HEADER_TYPE: &str = "x-type";

/// Value of [`HEADER_TYPE`] for unfiltered queries.
pub(crate) const TYPE_ANY: &str = "any";

/// Query string accepted by the services endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServicesQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl ServicesQuery {
    /// The requested type, validated. An empty value means "any".
    fn peer_type(&self) -> Result<Option<PeerType>, ApiError> {
        match self.kind.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(PeerType::parse(raw)?)),
        }
    }
}

/// Reject requests that do not accept JSON.
///
/// An absent header is fine; otherwise one of the listed media ranges must
/// be `application/json` or `*/*`.
fn check_accept(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(value) = headers.get(header::ACCEPT) else {
        return Ok(());
    };
    let raw = String::from_utf8_lossy(value.as_bytes());
    let acceptable = raw.split(',').any(|range| {
        let media = range.split(';').next().unwrap_or_default().trim();
        media.eq_ignore_ascii_case(JSON_CONTENT_TYPE) || media == "*/*"
    });
    if acceptable {
        Ok(())
    } else {
        Err(ApiError::NotAcceptable {
            accept: raw.to_string(),
        })
    }
}

/// Serialize `body` as JSON and attach the discovery headers.
fn respond<T: Serialize>(body: &T, begin: Instant, kind: &str) -> Result<Response, ApiError> {
    let bytes = serde_json::to_vec(body).map_err(|e| ApiError::Internal {
        message: format!("failed to encode response: {e}"),
    })?;

    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    let duration = format!("{}us", begin.elapsed().as_micros());
    headers.insert(
        HEADER_DURATION,
        HeaderValue::from_str(&duration).map_err(|e| ApiError::Internal {
            message: format!("bad duration header: {e}"),
        })?,
    );
    headers.insert(
        HEADER_TYPE,
        HeaderValue::from_str(kind).map_err(|e| ApiError::Internal {
            message: format!("bad type header: {e}"),
        })?,
    );
    Ok(response)
}

// -----------------------------------------------------------------------
// GET /services: list services, optionally filtered by type
// -----------------------------------------------------------------------

/// Response body for `GET /services`.
#[derive(Serialize)]
pub(crate) struct ServicesResponse {
    pub services: BTreeMap<String, Vec<String>>,
}

/// List service addresses grouped by type.
///
/// With `?type=X`, only `X` is listed; a type with no addresses is a 404.
pub(crate) async fn list_services(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ServicesQuery>,
) -> Result<Response, ApiError> {
    let begin = Instant::now();

    check_accept(&headers)?;
    let peer_type = query.peer_type()?;

    let filter = peer_type.as_ref().map(PeerType::as_str);
    let services = state.registry.services(filter);

    if let Some(category) = filter
        && services.get(category).is_none_or(Vec::is_empty)
    {
        return Err(ApiError::NoSuchType {
            category: category.to_string(),
        });
    }

    debug!(
        categories = services.len(),
        kind = filter.unwrap_or(TYPE_ANY),
        "services query"
    );
    respond(
        &ServicesResponse { services },
        begin,
        filter.unwrap_or(TYPE_ANY),
    )
}

// -----------------------------------------------------------------------
// GET /services/ring?type=X: ring layout of one type
// -----------------------------------------------------------------------

/// Response body for `GET /services/ring`.
#[derive(Serialize)]
pub(crate) struct RingResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub hashes: Vec<VirtualNode>,
    pub keys: BTreeMap<String, Vec<Entry>>,
}

/// Snapshot of one type's ring and the entries registered on it.
pub(crate) async fn ring_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ServicesQuery>,
) -> Result<Response, ApiError> {
    let begin = Instant::now();

    check_accept(&headers)?;
    let peer_type = query.peer_type()?.ok_or(ApiError::MissingParam("type"))?;

    let info = state
        .registry
        .info(peer_type.as_str())
        .ok_or_else(|| ApiError::NoSuchType {
            category: peer_type.to_string(),
        })?;

    let body = RingResponse {
        kind: info.category,
        hashes: info.hashes,
        keys: info.keys,
    };
    respond(&body, begin, peer_type.as_str())
}

/// Fallback for unknown routes.
pub(crate) async fn not_found(uri: Uri) -> ApiError {
    ApiError::NoRoute {
        path: uri.path().to_string(),
    }
}
