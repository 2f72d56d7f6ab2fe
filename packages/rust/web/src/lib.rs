//! HTTP surface for Codestep: the tutorial page and the JSON endpoints.

pub mod error;
pub mod extract;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use codestep_core::PageSettings;
use codestep_shared::{CodestepError, Result};
use codestep_storage::Storage;
use tokio::net::TcpListener;
use tracing::info;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
    pub page: Arc<PageSettings>,
}

impl AppState {
    pub fn new(storage: Storage, page: PageSettings) -> Self {
        Self {
            storage: Arc::new(storage),
            page: Arc::new(page),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/projectsv2/:project_id", get(handlers::project_page))
        .route(
            "/api/instructions/delete",
            post(handlers::delete_instruction),
        )
        .route(
            "/api/instructions/createEmptyInstruction",
            post(handlers::create_empty_instruction),
        )
        .route(
            "/api/instructions/duplicateInstruction",
            post(handlers::duplicate_instruction),
        )
        .route(
            "/api/instructions/update",
            post(handlers::update_instruction),
        )
        .route(
            "/api/instructions/getInstructionTitlesForProjectVariantId",
            get(handlers::instruction_titles),
        )
        .route(
            "/api/instructions/getById",
            get(handlers::instruction_by_id),
        )
        .route(
            "/api/projects/getProjectVariantId",
            get(handlers::project_variant),
        )
        .route(
            "/api/projects/getUsersPurchasedProjects",
            get(handlers::purchased_projects),
        )
        .with_state(state)
}

/// Bind a listener on `addr` (e.g. `127.0.0.1:3000`).
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| CodestepError::config(format!("invalid bind address {addr}: {e}")))?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| CodestepError::Network(format!("bind {addr} failed: {e}")))
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|e| CodestepError::Network(e.to_string()))?;
    info!(addr = %local, "codestep listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            // An error here means no signal handler; keep serving
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            info!("shutdown requested");
        })
        .await
        .map_err(|e| CodestepError::Network(format!("server failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codestep_shared::{
        BackendVariant, Environment, FeatureFlagSettings, FrontendVariant, NewCodeBlock,
    };
    use reqwest::StatusCode;
    use serde_json::{Value, json};

    struct TestApp {
        base: String,
        http: reqwest::Client,
        storage: Arc<Storage>,
        project_id: String,
        variant_id: String,
    }

    impl TestApp {
        fn url(&self, path: &str) -> String {
            format!("{}{path}", self.base)
        }

        fn get_as(&self, path: &str, user: Option<&str>) -> reqwest::RequestBuilder {
            let req = self.http.get(self.url(path));
            match user {
                Some(user) => req.header(handlers::USER_ID_HEADER, user),
                None => req,
            }
        }

        fn post_as(&self, path: &str, user: Option<&str>, body: Value) -> reqwest::RequestBuilder {
            let req = self.http.post(self.url(path)).json(&body);
            match user {
                Some(user) => req.header(handlers::USER_ID_HEADER, user),
                None => req,
            }
        }
    }

    async fn spawn_app() -> TestApp {
        let tmp = std::env::temp_dir().join(format!("codestep_web_{}.db", uuid::Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        let project = storage.insert_project("Todo").await.unwrap();
        let variant = storage
            .insert_project_variant(
                &project.id,
                FrontendVariant::NextJs,
                BackendVariant::Supabase,
                "author-1",
            )
            .await
            .unwrap();
        storage
            .insert_purchased_project("buyer", &project.id)
            .await
            .unwrap();

        let page = PageSettings {
            frontend_variant: FrontendVariant::NextJs,
            backend_variant: BackendVariant::Supabase,
            flags: FeatureFlagSettings {
                environment: Environment::Development,
                api_key: String::new(),
                host: "http://127.0.0.1:9".into(),
                qa_flag: "q-a-feature".into(),
                timeout_secs: 1,
            },
        };
        let state = AppState::new(storage, page);
        let storage = state.storage.clone();

        let listener = bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });

        TestApp {
            base,
            http: reqwest::Client::new(),
            storage,
            project_id: project.id,
            variant_id: variant.id,
        }
    }

    async fn create(app: &TestApp) -> Value {
        let res = app
            .post_as(
                "/api/instructions/createEmptyInstruction",
                Some("author-1"),
                json!({"projectVariantId": app.variant_id}),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    #[tokio::test]
    async fn healthz_ok() {
        let app = spawn_app().await;
        let res = app.get_as("/healthz", None).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.json::<Value>().await.unwrap(), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn private_endpoints_reject_anonymous() {
        let app = spawn_app().await;
        let res = app
            .post_as(
                "/api/instructions/createEmptyInstruction",
                None,
                json!({"projectVariantId": app.variant_id}),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body: Value = res.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("sign in required"));

        let res = app
            .get_as("/api/instructions/getById?instructionId=x", None)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn instruction_lifecycle_over_http() {
        let app = spawn_app().await;
        let created = create(&app).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["projectVariantId"], json!(app.variant_id));
        assert_eq!(created["hasCodeBlocks"], json!(true));

        let res = app
            .post_as(
                "/api/instructions/update",
                Some("author-1"),
                json!({
                    "instructionId": id,
                    "explanation": "Install deps",
                    "successMedia": {"mediaUrl": "https://cdn.example/a.png", "caption": "done"}
                }),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let updated: Value = res.json().await.unwrap();
        assert_eq!(updated["explanation"], json!("Install deps"));

        let detail: Value = app
            .get_as(&format!("/api/instructions/getById?instructionId={id}"), Some("author-1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(detail["codeBlocks"][0]["fileName"], json!("index.tsx"));
        assert_eq!(detail["successMedia"].as_array().unwrap().len(), 1);

        let titles: Value = app
            .get_as(
                &format!(
                    "/api/instructions/getInstructionTitlesForProjectVariantId?projectVariantId={}",
                    app.variant_id
                ),
                None,
            )
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(titles, json!([{"id": id, "title": ""}]));

        let deleted: Value = app
            .post_as("/api/instructions/delete", Some("author-1"), json!({"id": id}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(deleted["id"], json!(id));

        let again = app
            .post_as("/api/instructions/delete", Some("author-1"), json!({"id": id}))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
        let body: Value = again.json().await.unwrap();
        assert_eq!(body["error"], json!(format!("instruction not found: {id}")));
    }

    #[tokio::test]
    async fn duplicate_copies_blocks() {
        let app = spawn_app().await;
        let res = app
            .post_as(
                "/api/instructions/duplicateInstruction",
                Some("author-1"),
                json!({
                    "projectVariantId": app.variant_id,
                    "explanation": "copy",
                    "codeBlocks": [
                        {"instructionsId": "src", "code": "a", "fileName": "a.ts"},
                        {"instructionsId": "src", "code": "b", "fileName": "b.ts"}
                    ]
                }),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let created: Value = res.json().await.unwrap();
        let id = created["id"].as_str().unwrap();
        let blocks = app.storage.list_code_blocks(id).await.unwrap();
        let names: Vec<_> = blocks.iter().map(|b| b.file_name.as_str()).collect();
        assert_eq!(names, ["a.ts", "b.ts"]);
    }

    #[tokio::test]
    async fn update_missing_instruction_is_404() {
        let app = spawn_app().await;
        let res = app
            .post_as(
                "/api/instructions/update",
                Some("author-1"),
                json!({"instructionId": "nope", "hasCodeBlocks": false}),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_input_is_400_with_error_body() {
        let app = spawn_app().await;
        let res = app
            .post_as(
                "/api/instructions/createEmptyInstruction",
                Some("author-1"),
                json!({"wrong": 1}),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("validation error:"));
        assert!(message.contains("projectVariantId"));

        let res = app
            .http
            .post(app.url("/api/instructions/delete"))
            .header(handlers::USER_ID_HEADER, "author-1")
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.json::<Value>().await.unwrap()["error"].is_string());

        let res = app
            .get_as("/api/instructions/getInstructionTitlesForProjectVariantId", None)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("validation error:"));

        let res = app
            .get_as(
                &format!("/projectsv2/{}?editing=sometimes", app.project_id),
                Some("buyer"),
            )
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn project_queries() {
        let app = spawn_app().await;
        let variant: Value = app
            .get_as(
                &format!(
                    "/api/projects/getProjectVariantId?projectsId={}&frontendVariant=NextJS&backendVariant=Supabase",
                    app.project_id
                ),
                None,
            )
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(variant["id"], json!(app.variant_id));
        assert_eq!(variant["authorId"], json!("author-1"));

        let purchases: Value = app
            .get_as("/api/projects/getUsersPurchasedProjects?userId=buyer", Some("buyer"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(purchases[0]["projectsId"], json!(app.project_id));
    }

    #[tokio::test]
    async fn page_gated_by_purchase() {
        let app = spawn_app().await;
        let first = app
            .storage
            .create_instruction(&app.variant_id, "one", &[NewCodeBlock::placeholder()])
            .await
            .unwrap();
        app.storage
            .create_instruction(&app.variant_id, "two", &[])
            .await
            .unwrap();
        let path = format!(
            "/projectsv2/{}?instructionId={}&successfullyPurchased=true",
            app.project_id, first.id
        );

        let res = app.get_as(&path, Some("stranger")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(res.json::<Value>().await.unwrap(), json!({"view": "notFound"}));

        let res = app.get_as(&path, Some("buyer")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let view: Value = res.json().await.unwrap();
        assert_eq!(view["view"], json!("tutorial"));
        assert_eq!(view["showPurchaseBanner"], json!(true));
        assert_eq!(view["previous"], Value::Null);
        assert_eq!(view["next"]["kind"], json!("next"));
        assert_eq!(view["projectInstructionTitles"].as_array().unwrap().len(), 2);

        let res = app
            .get_as(&path, Some("staff"))
            .header(handlers::USER_IS_ADMIN_HEADER, "true")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let view: Value = res.json().await.unwrap();
        assert_eq!(view["isAdmin"], json!(true));
        assert_eq!(view["editingToggle"], json!("enableEditing"));
    }

    #[tokio::test]
    async fn page_for_unknown_project_is_404() {
        let app = spawn_app().await;
        let res = app
            .get_as("/projectsv2/unknown?instructionId=x", Some("buyer"))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
