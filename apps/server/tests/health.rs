use axum::{body::to_bytes, body::Body, http::Request};
use findata_server::{api::app_router, build_state, config::Config};
use tower::ServiceExt;

#[tokio::test]
async fn health_works() {
    let config = Config::default();
    let state = build_state(&config).await.unwrap();
    let app = app_router(state, &config);

    let response = app
        .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["scheduler"], "NotStarted");
    assert_eq!(json["cacheEnabled"], true);
}
