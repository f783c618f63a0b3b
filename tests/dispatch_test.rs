//! End-to-end dispatch through `App::handle`, without a socket

use hydrogen::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

async fn body_string(response: hyper::Response<hyper::Body>) -> String {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn counting_app(get_hits: Arc<AtomicUsize>, post_hits: Arc<AtomicUsize>) -> App {
    let mut app = App::new();
    app.get("/a", move |_req, res| {
        let hits = Arc::clone(&get_hits);
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            res.text("get");
            Ok(())
        })
    })
    .unwrap()
    .post("/a", move |_req, res| {
        let hits = Arc::clone(&post_hits);
        Box::pin(async move {
            hits.fetch_add(1, Ordering::SeqCst);
            res.text("post");
            Ok(())
        })
    })
    .unwrap();
    app
}

#[tokio::test]
async fn test_get_and_post_are_isolated() {
    let get_hits = Arc::new(AtomicUsize::new(0));
    let post_hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(Arc::clone(&get_hits), Arc::clone(&post_hits));

    let response = app.handle(Request::new(Method::POST, "/a")).await;
    assert_eq!(body_string(response).await, "post");
    assert_eq!(get_hits.load(Ordering::SeqCst), 0);
    assert_eq!(post_hits.load(Ordering::SeqCst), 1);

    let response = app.handle(Request::new(Method::GET, "/a")).await;
    assert_eq!(body_string(response).await, "get");
    assert_eq!(get_hits.load(Ordering::SeqCst), 1);
    assert_eq!(post_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unmatched_path_is_404_without_terminal() {
    let get_hits = Arc::new(AtomicUsize::new(0));
    let post_hits = Arc::new(AtomicUsize::new(0));
    let app = counting_app(Arc::clone(&get_hits), Arc::clone(&post_hits));

    for (method, target) in [
        (Method::GET, "/b"),
        (Method::GET, "/a/extra"),
        (Method::DELETE, "/a"),
        (Method::OPTIONS, "/a"),
    ] {
        let response = app.handle(Request::new(method, target)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", target);
    }
    assert_eq!(get_hits.load(Ordering::SeqCst), 0);
    assert_eq!(post_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_query_string_does_not_affect_matching() {
    let mut app = App::new();
    app.get("/search", |req, res| {
        Box::pin(async move {
            let tags = req
                .query()
                .get("tag")
                .map(|v| v.as_array().join("|"))
                .unwrap_or_default();
            res.text(tags);
            Ok(())
        })
    })
    .unwrap();

    let response = app
        .handle(Request::new(Method::GET, "/search?tag=a&tag=b&tag=c"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "a|b|c");
}

#[tokio::test]
async fn test_parser_rejection_is_not_overwritten() {
    let mut app = App::new();
    app.use_middleware(JsonParser);
    app.post("/items", |req, res| {
        Box::pin(async move {
            let name = match &req.data {
                Some(BodyData::Json(value)) => value["name"].as_str().unwrap_or("").to_string(),
                _ => String::new(),
            };
            res.set_status(StatusCode::CREATED);
            res.json(&serde_json::json!({ "created": name }))
        })
    })
    .unwrap();

    let bad = Request::new(Method::POST, "/items")
        .with_header("Content-Type", "application/json")
        .with_body("{\"name\":");
    let response = app.handle(bad).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let good = Request::new(Method::POST, "/items")
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"name":"widget"}"#);
    let response = app.handle(good).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(body_string(response).await, r#"{"created":"widget"}"#);
}

#[tokio::test]
async fn test_form_parser_feeds_route() {
    let mut app = App::new();
    app.use_middleware(UrlencodedParser);
    app.put("/profile/{user}", |req, res| {
        Box::pin(async move {
            let user = req.param("user").unwrap_or_default().to_string();
            let city = match &req.data {
                Some(BodyData::Form(form)) => form.get("city").map(|v| v.as_str().to_string()),
                _ => None,
            };
            res.text(format!("{} lives in {}", user, city.unwrap_or_default()));
            Ok(())
        })
    })
    .unwrap();

    let req = Request::new(Method::PUT, "/profile/ada")
        .with_header("Content-Type", "application/x-www-form-urlencoded")
        .with_body("city=London");
    let response = app.handle(req).await;
    assert_eq!(body_string(response).await, "ada lives in London");
}

#[tokio::test]
async fn test_failures_are_generic_500() {
    let mut app = App::new();
    app.use_fn(|req, res, next| {
        Box::pin(async move {
            if req.path() == "/explode" {
                return Err(Error::handler("secret connection string"));
            }
            next.run(req, res).await
        })
    });

    let response = app.handle(Request::new(Method::GET, "/explode")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert_eq!(body, "Internal Server Error");
    assert!(!body.contains("secret"));

    // the app keeps serving after a failure
    let response = app.handle(Request::new(Method::GET, "/fine")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_middleware_after_routes_still_runs() {
    let mut app = App::new();
    app.get("/known", |_req, res| {
        Box::pin(async move {
            res.text("known");
            Ok(())
        })
    })
    .unwrap();
    app.use_fn(|_req, res, _next| {
        Box::pin(async move {
            res.set_status(StatusCode::GONE);
            res.text("fallback");
            Ok(())
        })
    });

    let response = app.handle(Request::new(Method::GET, "/missing")).await;
    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_string(response).await, "fallback");

    let response = app.handle(Request::new(Method::GET, "/known")).await;
    assert_eq!(body_string(response).await, "known");
}

#[tokio::test]
async fn test_catch_all_route() {
    let mut app = App::new();
    app.get("/api/status", |_req, res| {
        Box::pin(async move {
            res.text("ok");
            Ok(())
        })
    })
    .unwrap()
    .get("*", |req, res| {
        Box::pin(async move {
            res.text(format!("spa {}", req.path()));
            Ok(())
        })
    })
    .unwrap();

    let response = app.handle(Request::new(Method::GET, "/api/status")).await;
    assert_eq!(body_string(response).await, "ok");

    let response = app.handle(Request::new(Method::GET, "/deep/link/1")).await;
    assert_eq!(body_string(response).await, "spa /deep/link/1");
}
