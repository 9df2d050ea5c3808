use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::{Auth, Grant};
use crate::error::MicrosubError;
use crate::merge::{TimelineQuery, DEFAULT_LIMIT};
use crate::router::Router;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A Microsub request with its parameters already flattened from the query
/// string and body.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    pub method: Method,
    pub params: HashMap<String, String>,
    pub auth: Auth,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointResponse {
    pub status: u16,
    pub body: Value,
}

/// Translates Microsub actions into router calls, independent of any HTTP
/// framework.
pub struct EndpointHandler {
    pub router: Arc<Router>,
}

impl EndpointHandler {
    pub fn new(router: Arc<Router>) -> Self {
        EndpointHandler { router }
    }

    pub async fn handle(&self, req: EndpointRequest) -> EndpointResponse {
        match self.dispatch(req).await {
            Ok(body) => EndpointResponse { status: 200, body },
            Err(e) => {
                debug!(error = %e, "Request failed");
                let response = e.to_response();
                EndpointResponse {
                    status: response.status,
                    body: response.to_json(),
                }
            }
        }
    }

    async fn dispatch(&self, req: EndpointRequest) -> Result<Value, MicrosubError> {
        let grant = match req.auth {
            Auth::Missing => return Err(MicrosubError::Unauthorized("Missing access token".into())),
            Auth::Invalid => return Err(MicrosubError::Unauthorized("Invalid access token".into())),
            Auth::Granted(grant) => grant,
        };

        let params = &req.params;
        let action = required(params, "action")?;
        require_scope(&grant, required_scope(req.method, action))?;
        let user = grant.user_id.as_str();
        debug!(action = %action, method = ?req.method, user = %user, "Handling request");

        match (req.method, action) {
            (Method::Get, "channels") => {
                Ok(serde_json::json!({ "channels": self.router.channels(user).await }))
            }
            (Method::Post, "channels") => Err(MicrosubError::NotImplemented(
                "Channel management is not supported".into(),
            )),
            (Method::Get, "timeline") => {
                let channel = required(params, "channel")?;
                let query = timeline_query(params)?;
                to_json(&self.router.timeline(channel, &query).await?)
            }
            (Method::Post, "timeline") => Err(MicrosubError::NotImplemented(
                "Timeline updates are not supported".into(),
            )),
            (Method::Get, "follow") => {
                let channel = required(params, "channel")?;
                Ok(serde_json::json!({ "items": self.router.following(channel, user).await }))
            }
            (Method::Post, "follow") => {
                let channel = required(params, "channel")?;
                let url = required(params, "url")?;
                to_json(&self.router.follow(channel, url, user).await?)
            }
            (Method::Post, "unfollow") => {
                let channel = required(params, "channel")?;
                let url = required(params, "url")?;
                if self.router.unfollow(channel, url, user).await? {
                    Ok(serde_json::json!({}))
                } else {
                    Err(MicrosubError::Server(format!("Failed to unfollow {url}")))
                }
            }
            (_, "search") => {
                let query = required(params, "query")?;
                to_json(&self.router.search(query, user).await?)
            }
            (_, "preview") => {
                let url = required(params, "url")?;
                to_json(&self.router.preview(url, user).await?)
            }
            (Method::Get, "unfollow") => Err(MicrosubError::InvalidRequest(
                "unfollow requires POST".into(),
            )),
            (_, other) => Err(MicrosubError::InvalidRequest(format!("Unknown action: {other}"))),
        }
    }
}

fn required_scope(method: Method, action: &str) -> &'static str {
    match (method, action) {
        (Method::Post, "channels") => "channels",
        (Method::Post, "follow" | "unfollow") => "follow",
        _ => "read",
    }
}

fn require_scope(grant: &Grant, scope: &str) -> Result<(), MicrosubError> {
    if grant.has_scope(scope) {
        Ok(())
    } else {
        Err(MicrosubError::InsufficientScope(format!("Requires {scope} scope")))
    }
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, MicrosubError> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MicrosubError::InvalidRequest(format!("Missing {name} parameter")))
}

fn optional<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn timeline_query(params: &HashMap<String, String>) -> Result<TimelineQuery, MicrosubError> {
    let limit = match optional(params, "limit") {
        Some(raw) => raw
            .parse()
            .map_err(|_| MicrosubError::InvalidRequest(format!("Invalid limit: {raw}")))?,
        None => DEFAULT_LIMIT,
    };
    Ok(TimelineQuery {
        after: optional(params, "after").map(str::to_string),
        before: optional(params, "before").map(str::to_string),
        limit,
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, MicrosubError> {
    serde_json::to_value(value).map_err(|e| MicrosubError::Server(format!("Failed to encode response: {e}")))
}
