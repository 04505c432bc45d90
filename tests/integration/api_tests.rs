use super::*;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use ifall::scheduler::{RunGuard, SchedulerStats};
use ifall::storage::UserRepository;
use ifall::web::{create_router, AppState};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    users: Arc<UserRepository>,
}

async fn test_app() -> anyhow::Result<TestApp> {
    let pool = storage::connect_in_memory().await?;
    let users = Arc::new(UserRepository::new(pool.clone()));
    let state = AppState {
        users: Arc::clone(&users),
        pool,
        refresh_guard: RunGuard::new(),
        scheduler_stats: Arc::new(RwLock::new(SchedulerStats::default())),
    };

    Ok(TestApp {
        router: create_router(state, Duration::from_secs(30)),
        users,
    })
}

async fn make_request(app: &Router, method: Method, uri: &str, body: Option<Value>) -> anyhow::Result<(StatusCode, Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body)?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, json))
}

#[tokio::test]
async fn test_signup_then_subscribe_receives_report() -> anyhow::Result<()> {
    let app = test_app().await?;

    let (status, body) = make_request(
        &app.router,
        Method::POST,
        "/api/v1/users",
        Some(json!({"name": "Kirill", "email": "kir@example.com", "telegram": "@kirtg"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "success"}));

    // What `/start` does once the bot sees the user's chat
    app.users.set_chat_id("kirtg", 555).await?;

    let recipients = app.users.list_recipients().await?;
    assert_eq!(
        recipients,
        vec![Recipient {
            email: "kir@example.com".to_string(),
            chat_id: Some(555),
        }]
    );

    let email = Arc::new(RecordingEmail::default());
    let chat = Arc::new(RecordingChat::default());
    let dispatcher = ReportDispatcher::new(
        app.users.clone(),
        email.clone(),
        chat.clone(),
        ReportFormatter::new(default_variant_glyphs()),
        REPORT_SUBJECT,
        Duration::from_secs(15),
    );
    let items = vec![Item {
        id: "sku-black".to_string(),
        name: "Phone 17 Black".to_string(),
        price: dec("900.00"),
        delta: Decimal::ZERO,
        variant: "353839".to_string(),
    }];
    dispatcher.send_report(&items).await?;

    assert_eq!(email.batches()[0].recipients, vec!["kir@example.com".to_string()]);
    assert_eq!(chat.messages()[0].0, 555);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() -> anyhow::Result<()> {
    let app = test_app().await?;
    let signup = json!({"name": "Kirill", "email": "kir@example.com"});

    let (status, _) = make_request(&app.router, Method::POST, "/api/v1/users", Some(signup.clone())).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = make_request(&app.router, Method::POST, "/api/v1/users", Some(signup)).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    Ok(())
}

#[tokio::test]
async fn test_signup_rejections() -> anyhow::Result<()> {
    let app = test_app().await?;

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/v1/users",
        Some(json!({"name": "", "email": "kir@example.com"})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &app.router,
        Method::POST,
        "/api/v1/users",
        Some(json!({"email": "kir@example.com"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_and_health() -> anyhow::Result<()> {
    let app = test_app().await?;

    let (status, _) = make_request(&app.router, Method::GET, "/api/v1/items", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = make_request(&app.router, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"][0]["name"], "database");

    Ok(())
}
