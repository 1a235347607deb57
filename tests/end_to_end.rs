use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;
use blog_service::config::{AuthConfig, Config};
use blog_service::models::{ArticleEnvelope, ArticleListResponse};
use blog_service::user_models::UserEnvelope;
use blog_service::{build_router, AppState};
use serde_json::json;
use std::path::Path;

fn config(data_dir: Option<&Path>) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        data_dir: data_dir.map(Path::to_path_buf),
        secret_key: Some("end-to-end-secret".to_string()),
        auth: AuthConfig {
            bcrypt_cost: 4,
            ..Default::default()
        },
    }
}

fn server(config: Config) -> TestServer {
    let state = AppState::open(config).expect("Failed to open stores");
    TestServer::new(build_router(state)).expect("Failed to create test server")
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

async fn register(server: &TestServer, username: &str) -> String {
    let response = server
        .post("/users")
        .json(&json!({
            "firstname": "Ada",
            "lastname": "Lovelace",
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "analytical",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<UserEnvelope>().user.token
}

#[tokio::test]
async fn test_article_lifecycle() {
    let server = server(config(None));
    let token = register(&server, "ada").await;

    let created = server
        .post("/articles")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({
            "title": "Notes on the Engine",
            "description": "Sketch",
            "body": "The engine weaves algebraic patterns.",
            "username": "ada",
            "tags": "math,engines",
        }))
        .await;
    created.assert_status_ok();
    assert_eq!(created.json::<ArticleEnvelope>().article.slug, "notes-on-the-engine");

    let found = server.get("/articles/notes-on-the-engine").await.json::<ArticleListResponse>();
    assert_eq!(found.articles.len(), 1);
    let article = &found.articles[0];
    assert_eq!(article.title, "Notes on the Engine");
    assert_eq!(article.body, "The engine weaves algebraic patterns.");
    assert_eq!(article.tags.len(), 2);

    let updated = server
        .put("/articles/notes-on-the-engine")
        .add_header(AUTHORIZATION, bearer(&token))
        .json(&json!({ "username": "ada", "title": "Sketch of the Analytical Engine" }))
        .await;
    updated.assert_status(StatusCode::CREATED);
    assert_eq!(
        updated.json::<ArticleEnvelope>().article.slug,
        "sketch-of-the-analytical-engine"
    );

    let old = server.get("/articles/notes-on-the-engine").await.json::<ArticleListResponse>();
    assert!(old.articles.is_empty());
    let new = server
        .get("/articles/sketch-of-the-analytical-engine")
        .await
        .json::<ArticleListResponse>();
    assert_eq!(new.articles[0].tags.len(), 2);
}

#[tokio::test]
async fn test_data_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let token = {
        let server = server(config(Some(dir.path())));
        let token = register(&server, "ada").await;
        server
            .post("/articles")
            .add_header(AUTHORIZATION, bearer(&token))
            .json(&json!({ "title": "Persistent", "username": "ada", "tags": "disk" }))
            .await
            .assert_status_ok();
        token
    };

    let server = server(config(Some(dir.path())));

    let me = server.get("/users/user").add_header(AUTHORIZATION, bearer(&token)).await;
    me.assert_status_ok();
    assert_eq!(me.json::<UserEnvelope>().user.username, "ada");

    let found = server.get("/articles/persistent").await.json::<ArticleListResponse>();
    assert_eq!(found.articles[0].tags, vec!["disk"]);

    server
        .delete("/articles/persistent")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status_ok();
}
