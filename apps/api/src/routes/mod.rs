pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::classification::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/roles", get(handlers::handle_list_roles))
        .route("/api/v1/classify", post(handlers::handle_classify))
        .route(
            "/api/v1/templates/customize",
            post(handlers::handle_customize),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::classification::catalog::{RoleCatalog, RoleKey};
    use crate::classification::pipeline::{Classifier, DEFAULT_MAX_INPUT_BYTES};
    use crate::classification::selector::SelectionPolicy;
    use crate::classification::semantic::NoopAnalyzer;
    use crate::classification::templates::FsTemplateStore;
    use crate::config::Config;

    const TEX: &str = "\\documentclass{article}\n\\begin{document}\n\
                       {{job_title}} at {{company}}\n\\end{document}\n";

    fn app(skip: &[RoleKey]) -> (Router, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        for role in RoleKey::ALL.iter().filter(|r| !skip.contains(r)) {
            let role_dir = dir.path().join(role.as_str());
            fs::create_dir(&role_dir).unwrap();
            fs::write(role_dir.join("resume.tex"), TEX).unwrap();
        }

        let config = Config {
            port: 0,
            rust_log: "info".to_string(),
            template_root: dir.path().to_path_buf(),
            catalog_path: None,
            anthropic_api_key: None,
            ai_timeout: Duration::from_secs(5),
            max_jd_bytes: DEFAULT_MAX_INPUT_BYTES,
            breakdown_threshold: 5.0,
            alignment_min_fraction: 0.10,
        };
        let classifier = Classifier::new(
            Arc::new(RoleCatalog::builtin().unwrap()),
            Arc::new(FsTemplateStore::new(dir.path())),
            SelectionPolicy::default(),
            config.max_jd_bytes,
        )
        .unwrap();

        let state = AppState {
            config,
            classifier: Arc::new(classifier),
            analyzer: Arc::new(NoopAnalyzer),
        };
        (build_router(state), dir)
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _dir) = app(&[]);
        let (status, body) = send(router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_list_roles() {
        let (router, _dir) = app(&[]);
        let (status, body) = send(router, "GET", "/api/v1/roles", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["default_role"], "software_engineer");
        assert_eq!(body["guarded_role"], "ai_systems");
        assert_eq!(body["roles"].as_array().unwrap().len(), RoleKey::ALL.len());
    }

    #[tokio::test]
    async fn test_classify_fullstack_jd() {
        let (router, dir) = app(&[]);
        let jd = "Full Stack Engineer. React, TypeScript and Node.js on the frontend, \
                  Flask APIs, deployed on AWS. Some LLM integration work.";
        let (status, body) = send(router, "POST", "/api/v1/classify", Some(json!({ "jd_text": jd }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "matched");
        assert_eq!(body["role"], "fullstack");
        assert_eq!(body["display_name"], "Full Stack Engineer");
        assert_eq!(body["percentages"]["ai_systems"], 0.0);
        let expected = PathBuf::from(dir.path()).join("fullstack").join("resume.tex");
        assert_eq!(body["template_path"], expected.display().to_string());
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));

        let sum: f64 = body["percentages"]
            .as_object()
            .unwrap()
            .values()
            .map(|v| v.as_f64().unwrap())
            .sum();
        assert!((sum - 100.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_classify_reports_template_fallback() {
        let (router, _dir) = app(&[RoleKey::Fullstack]);
        let jd = "React, TypeScript, Node.js, Flask, GraphQL. Kubernetes and Docker on AWS.";
        let (status, body) = send(router, "POST", "/api/v1/classify", Some(json!({ "jd_text": jd }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "devops_cloud");
        assert_eq!(body["fallback_used"], true);
        assert_eq!(body["fallback_steps"][0]["role"], "fullstack");
        assert_eq!(body["fallback_steps"][0]["reason"], "template_missing");
    }

    #[tokio::test]
    async fn test_classify_rejects_empty_jd() {
        let (router, _dir) = app(&[]);
        let (status, body) = send(router, "POST", "/api/v1/classify", Some(json!({ "jd_text": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_classify_no_signal() {
        let (router, _dir) = app(&[]);
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/classify",
            Some(json!({ "jd_text": "Pastry chef wanted for a busy bakery." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "no_signal");
        assert_eq!(body["role"], "software_engineer");
        assert!(body["breakdown"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_customize_fills_and_escapes() {
        let (router, _dir) = app(&[]);
        let (status, body) = send(
            router,
            "POST",
            "/api/v1/templates/customize",
            Some(json!({
                "jd_text": "Backend engineer: Rust, Kafka, PostgreSQL, distributed systems.",
                "company": "Q&A Labs",
                "job_title": "Senior_Backend"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["classification"]["role"], "backend");
        let content = body["document"]["content"].as_str().unwrap();
        assert!(content.contains("Senior\\_Backend at Q\\&A Labs"));
        assert!(content.contains("\\begin{document}"));
    }
}
