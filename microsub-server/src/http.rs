use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, Method as HttpMethod, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router as AxumRouter};
use serde_json::Value;
use tracing::debug;

use microsub_core::auth::bearer_token;
use microsub_core::{EndpointHandler, EndpointRequest, ErrorCode, ErrorResponse, Method, TokenTable};

#[derive(Clone)]
pub struct AppState {
    pub endpoint: Arc<EndpointHandler>,
    pub tokens: Arc<TokenTable>,
}

pub fn app(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/microsub", get(handle_microsub).post(handle_microsub))
        .with_state(state)
}

async fn handle_microsub(
    State(state): State<AppState>,
    method: HttpMethod,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let method = if method == HttpMethod::POST { Method::Post } else { Method::Get };

    let mut params = form_params(query.as_deref().unwrap_or_default().as_bytes());
    if method == Method::Post && !body.is_empty() {
        match body_params(&headers, &body) {
            // Body values win over the query string.
            Ok(body) => params.extend(body),
            Err(description) => return error_response(ErrorCode::InvalidRequest.with_description(description)),
        }
    }

    let header_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);
    let param_token = params.remove("access_token");
    let auth = state.tokens.resolve(header_token.or(param_token).as_deref());

    let response = state
        .endpoint
        .handle(EndpointRequest { method, params, auth })
        .await;
    debug!(status = response.status, "Responding");

    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

fn error_response(error: ErrorResponse) -> Response {
    let status = StatusCode::from_u16(error.status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, Json(error.to_json())).into_response()
}

fn form_params(raw: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(raw).into_owned().collect()
}

/// Flatten a POST body into parameters. JSON objects contribute their scalar
/// members; anything else is read as `application/x-www-form-urlencoded`.
fn body_params(headers: &HeaderMap, body: &[u8]) -> Result<HashMap<String, String>, String> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json {
        return Ok(form_params(body));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                _ => None,
            })
            .collect()),
        Ok(_) => Err("JSON body must be an object".to_string()),
        Err(e) => Err(format!("Invalid JSON body: {e}")),
    }
}
