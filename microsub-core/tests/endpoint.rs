mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::*;
use microsub_core::{Auth, EndpointHandler, EndpointRequest, Grant, Method};
use serde_json::json;

fn handler() -> EndpointHandler {
    let discovery = Arc::new(MockDiscovery::new().with_feed(
        feed(
            "https://blog.example/feed.xml",
            "Example Blog",
            vec![post("a", "2024-01-01"), post("b", "2024-01-02")],
        ),
        &[],
    ));
    EndpointHandler::new(Arc::new(router(vec![
        Arc::new(feed_adapter(discovery)),
        Arc::new(SecondAdapter),
    ])))
}

fn request(method: Method, scopes: &[&str], params: &[(&str, &str)]) -> EndpointRequest {
    EndpointRequest {
        method,
        params: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        auth: Auth::Granted(Grant::new("1", scopes)),
    }
}

#[tokio::test]
async fn authentication_is_checked_first() {
    let handler = handler();

    let mut req = request(Method::Get, &[], &[("action", "channels")]);
    req.auth = Auth::Missing;
    let response = handler.handle(req.clone()).await;
    assert_eq!(response.status, 401);
    assert_eq!(response.body["error"], "unauthorized");

    req.auth = Auth::Invalid;
    let response = handler.handle(req).await;
    assert_eq!(response.status, 401);
    assert_eq!(response.body["error"], "unauthorized");
    assert_eq!(response.body["error_description"], "Invalid access token");
}

#[tokio::test]
async fn scope_is_required_per_action() {
    let handler = handler();

    let response = handler
        .handle(request(Method::Get, &["follow"], &[("action", "channels")]))
        .await;
    assert_eq!(response.status, 403);
    assert_eq!(response.body["error"], "insufficient_scope");

    let response = handler
        .handle(request(
            Method::Post,
            &["read"],
            &[("action", "follow"), ("channel", "home"), ("url", "https://blog.example/feed.xml")],
        ))
        .await;
    assert_eq!(response.status, 403);
    assert_eq!(response.body["error"], "insufficient_scope");
}

#[tokio::test]
async fn channels_are_listed() {
    let response = handler()
        .handle(request(Method::Get, &["read"], &[("action", "channels")]))
        .await;
    assert_eq!(response.status, 200);
    let uids: Vec<_> = response.body["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["uid"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(uids, vec!["notifications", "home", "second-channel"]);
    assert_eq!(response.body["channels"][0]["unread"], 0);
    assert!(response.body["channels"][1].get("unread").is_none());
}

#[tokio::test]
async fn follow_timeline_unfollow_round() {
    let handler = handler();
    let scopes = ["read", "follow"];

    let response = handler
        .handle(request(
            Method::Post,
            &scopes,
            &[("action", "follow"), ("channel", "home"), ("url", "https://blog.example/feed.xml")],
        ))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["type"], "feed");
    assert_eq!(response.body["url"], "https://blog.example/feed.xml");

    let response = handler
        .handle(request(
            Method::Get,
            &scopes,
            &[("action", "timeline"), ("channel", "home"), ("limit", "1")],
        ))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["items"][0]["_id"], "feeds:https://blog.example/feed.xml:b");
    assert!(response.body["paging"]["after"].is_string());

    let response = handler
        .handle(request(
            Method::Get,
            &scopes,
            &[("action", "follow"), ("channel", "home")],
        ))
        .await;
    assert_eq!(response.body["items"][0]["url"], "https://blog.example/feed.xml");

    let response = handler
        .handle(request(
            Method::Post,
            &scopes,
            &[("action", "unfollow"), ("channel", "home"), ("url", "https://blog.example/feed.xml")],
        ))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({}));
}

#[tokio::test]
async fn errors_carry_codes_and_descriptions() {
    let handler = handler();

    let response = handler
        .handle(request(Method::Get, &["read"], &[("action", "timeline")]))
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body["error"], "invalid_request");
    assert!(response.body["error_description"].is_string());

    let response = handler
        .handle(request(
            Method::Get,
            &["read"],
            &[("action", "timeline"), ("channel", "nowhere")],
        ))
        .await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], "not_found");

    let response = handler
        .handle(request(Method::Post, &["channels"], &[("action", "channels"), ("name", "New")]))
        .await;
    assert_eq!(response.status, 501);
    assert_eq!(response.body["error"], "not_implemented");

    let response = handler
        .handle(request(Method::Get, &["read"], &[("action", "mute")]))
        .await;
    assert_eq!(response.status, 400);

    let response = handler.handle(request(Method::Get, &["read"], &[])).await;
    assert_eq!(response.status, 400);
}

#[tokio::test]
async fn unfollow_of_unknown_feed_is_not_found() {
    let response = handler()
        .handle(request(
            Method::Post,
            &["follow"],
            &[("action", "unfollow"), ("channel", "home"), ("url", "https://nobody.example/")],
        ))
        .await;
    assert_eq!(response.status, 404);
    assert_eq!(response.body["error"], "not_found");
}

#[tokio::test]
async fn search_and_preview_reach_the_feed_adapter() {
    let handler = handler();

    let response = handler
        .handle(request(Method::Post, &["read"], &[("action", "search"), ("query", "rust news")]))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["results"], json!([]));

    let response = handler
        .handle(request(
            Method::Get,
            &["read"],
            &[("action", "preview"), ("url", "https://blog.example/feed.xml")],
        ))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body["items"].as_array().unwrap().len(), 2);
}
