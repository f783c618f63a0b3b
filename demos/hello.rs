//! Minimal Hydrogen application
//!
//! ```sh
//! cargo run --example hello -- --port 8080
//! curl http://127.0.0.1:8080/users/42
//! curl -X POST -H 'Content-Type: application/json' -d '{"name":"ada"}' http://127.0.0.1:8080/users
//! ```

use hydrogen::prelude::*;

#[tokio::main]
async fn main() -> hydrogen::Result<()> {
    let mut app = App::with_args()?;

    env_logger::Builder::new()
        .filter_level(app.config().logging.level_filter())
        .init();

    app.cors(CorsPolicy::new().expose_headers(vec!["X-Request-Id".into()]))
        .use_middleware(LoggingMiddleware::new().with_emoji())
        .use_middleware(JsonParser);

    app.get("/", |_req, res| {
        Box::pin(async move {
            res.text("Hello from Hydrogen");
            Ok(())
        })
    })?
    .get("/users/{id}", |req, res| {
        Box::pin(async move {
            let id = req.param("id").unwrap_or_default().to_string();
            res.json(&serde_json::json!({ "id": id }))
        })
    })?
    .post("/users", |req, res| {
        Box::pin(async move {
            let name = match &req.data {
                Some(BodyData::Json(body)) => body.get("name").cloned(),
                _ => None,
            };
            match name {
                Some(name) => {
                    res.set_status(StatusCode::CREATED);
                    res.json(&serde_json::json!({ "created": name }))
                }
                None => {
                    res.set_status(StatusCode::UNPROCESSABLE_ENTITY);
                    res.text("name is required");
                    Ok(())
                }
            }
        })
    })?;

    app.serve(None).await
}
