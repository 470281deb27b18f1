mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestApp, test_config};
use serde_json::json;

fn ingress_request() -> Request<Body> {
    let body = json!({
        "userId": "u1",
        "type": "new_follower",
        "title": "New follower",
        "message": "Ada followed you"
    });
    Request::builder()
        .method("POST")
        .uri("/api/v1/notifications")
        .header("content-type", "application/json")
        .header("x-forwarded-for", "10.0.0.7")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn list_request(app: &TestApp) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/api/v1/notifications")
        .header("authorization", format!("Bearer {}", app.token("u1")))
        .header("x-forwarded-for", "10.0.0.7")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn user_limiter_does_not_throttle_ingress() {
    let app = TestApp::served(&test_config(&["--rate-limit-req-per-sec", "1"]));

    for _ in 0..5 {
        let (status, _) = app.send(ingress_request()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    assert_eq!(app.queue.requests.lock().await.len(), 5);

    let (first, _) = app.send(list_request(&app)).await;
    let (second, _) = app.send(list_request(&app)).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn ingress_limiter_applies_when_configured() {
    let app = TestApp::served(&test_config(&[
        "--rate-limit-req-per-sec",
        "1",
        "--ingress-rate-limit-per-sec",
        "2",
    ]));

    let mut statuses = vec![];
    for _ in 0..3 {
        statuses.push(app.send(ingress_request()).await.0);
    }
    assert_eq!(
        statuses,
        vec![
            StatusCode::ACCEPTED,
            StatusCode::ACCEPTED,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );

    let (status, _) = app.send(list_request(&app)).await;
    assert_eq!(status, StatusCode::OK);
}
