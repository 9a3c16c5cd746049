use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::state::AppState;
use crate::{auth, dashboard, data, jobs, learning, mood, pomodoro, settings};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(jobs::router())
                .merge(mood::router())
                .merge(pomodoro::router())
                .merge(learning::router())
                .merge(settings::router())
                .merge(dashboard::router())
                .merge(data::router())
                .route("/health", get(|| async { "ok" }))
                .route("/health/store", get(store_health)),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn store_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let backend = state.store.backend();
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "backend": backend, "ok": true }))),
        Err(e) => {
            warn!(backend, error = %e, "store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "backend": backend, "ok": false })),
            )
        }
    }
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request},
        response::Response,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        app.clone().oneshot(req.body(body).unwrap()).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, email: &str) -> String {
        let res = call(
            app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": email, "password": "password123", "name": "Tester" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await["accessToken"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_endpoints() {
        let app = build_app(AppState::fake().await);
        let res = call(&app, Method::GET, "/api/v1/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = call(&app, Method::GET, "/api/v1/health/store", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["backend"], "local");
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn register_login_and_me() {
        let app = build_app(AppState::fake().await);
        let token = register(&app, " Ada@Example.com ").await;

        let res = call(&app, Method::GET, "/api/v1/me", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let me = json_body(res).await;
        assert_eq!(me["email"], "ada@example.com");
        assert!(me.get("password_hash").is_none());

        let dup = call(
            &app,
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "ada@example.com", "password": "password123" })),
        )
        .await;
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let bad = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(bad).await["error"], "Invalid credentials");

        let res = call(&app, Method::GET, "/api/v1/me", None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn refresh_requires_a_refresh_token() {
        let app = build_app(AppState::fake().await);
        let access = register(&app, "r@example.com").await;
        let res = call(
            &app,
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refreshToken": access })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forgot_password_answers_the_same_for_unknown_emails() {
        let app = build_app(AppState::fake().await);
        register(&app, "known@example.com").await;

        let mut bodies = Vec::new();
        for email in ["known@example.com", "nobody@example.com"] {
            let res = call(
                &app,
                Method::POST,
                "/api/v1/auth/forgot-password",
                None,
                Some(json!({ "email": email })),
            )
            .await;
            assert_eq!(res.status(), StatusCode::OK);
            bodies.push(json_body(res).await);
        }
        assert_eq!(bodies[0], bodies[1]);
        assert_eq!(bodies[0]["success"], true);

        let res = call(
            &app,
            Method::POST,
            "/api/v1/auth/reset-password",
            None,
            Some(json!({ "token": "deadbeef", "password": "new-password" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_password_with_a_stored_token() {
        use crate::auth::services::hash_reset_token;
        use time::{Duration, OffsetDateTime};

        let state = AppState::fake().await;
        let app = build_app(state.clone());
        register(&app, "reset@example.com").await;
        state
            .store
            .create_reset_token(
                "reset@example.com",
                &hash_reset_token("raw-token"),
                OffsetDateTime::now_utc() + Duration::minutes(30),
            )
            .await
            .unwrap();

        let body = json!({ "token": "raw-token", "password": "brand-new-pass" });
        let res = call(&app, Method::POST, "/api/v1/auth/reset-password", None, Some(body.clone())).await;
        assert_eq!(res.status(), StatusCode::OK);
        // single use
        let res = call(&app, Method::POST, "/api/v1/auth/reset-password", None, Some(body)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let late = json!({ "token": "raw-token", "password": "someone-elses" });
        let res = call(&app, Method::POST, "/api/v1/auth/reset-password", None, Some(late)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = call(
            &app,
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "email": "reset@example.com", "password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn concurrent_resets_redeem_a_token_once() {
        use crate::auth::services::hash_reset_token;
        use time::{Duration, OffsetDateTime};

        let state = AppState::fake().await;
        let app = build_app(state.clone());
        register(&app, "race@example.com").await;
        state
            .store
            .create_reset_token(
                "race@example.com",
                &hash_reset_token("race-token"),
                OffsetDateTime::now_utc() + Duration::minutes(30),
            )
            .await
            .unwrap();

        let first = json!({ "token": "race-token", "password": "first-password" });
        let second = json!({ "token": "race-token", "password": "second-password" });
        let (a, b) = tokio::join!(
            call(&app, Method::POST, "/api/v1/auth/reset-password", None, Some(first)),
            call(&app, Method::POST, "/api/v1/auth/reset-password", None, Some(second)),
        );
        let mut statuses = [a.status().as_u16(), b.status().as_u16()];
        statuses.sort_unstable();
        assert_eq!(statuses, [200, 400]);

        let mut accepted = 0;
        for password in ["first-password", "second-password"] {
            let login = json!({ "email": "race@example.com", "password": password });
            let res = call(&app, Method::POST, "/api/v1/auth/login", None, Some(login)).await;
            if res.status() == StatusCode::OK {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn check_email_reports_existence() {
        let app = build_app(AppState::fake().await);
        register(&app, "here@example.com").await;

        let res = call(&app, Method::POST, "/api/v1/auth/check-email", None, Some(json!({ "email": "HERE@example.com" }))).await;
        let body = json_body(res).await;
        assert_eq!(body["exists"], true);
        assert_eq!(body["email"], "here@example.com");

        let res = call(&app, Method::POST, "/api/v1/auth/check-email", None, Some(json!({}))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn apple_mock_signs_in_through_the_callback() {
        let app = build_app(AppState::fake().await);
        let res = call(&app, Method::GET, "/api/v1/auth/oauth/providers", None, None).await;
        assert_eq!(json_body(res).await["providers"], json!(["apple"]));

        let res = call(&app, Method::GET, "/api/v1/auth/oauth/apple/authorize", None, None).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        let location = res.headers()[header::LOCATION].to_str().unwrap().to_string();
        let path = location.trim_start_matches("http://localhost:3000");

        let res = call(&app, Method::GET, path, None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["user"]["email"], "user@icloud.com");
        assert_eq!(body["user"]["provider"], "apple");

        let res = call(&app, Method::GET, "/api/v1/auth/oauth/google/authorize", None, None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let forged = "/api/v1/auth/oauth/apple/callback?code=mock&state=forged";
        let res = call(&app, Method::GET, forged, None, None).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn jobs_crud_is_scoped_to_the_owner() {
        let app = build_app(AppState::fake().await);
        let alice = register(&app, "alice@example.com").await;
        let bob = register(&app, "bob@example.com").await;

        let res = call(
            &app,
            Method::POST,
            "/api/v1/jobs",
            Some(&alice),
            Some(json!({ "company": "Acme", "position": "Engineer", "priority": "HIGH" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert!(res.headers().contains_key(header::LOCATION));
        let job = json_body(res).await;
        let id = job["id"].as_str().unwrap().to_string();
        assert_eq!(job["status"], "APPLIED");

        let uri = format!("/api/v1/jobs/{id}");
        let res = call(&app, Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = call(
            &app,
            Method::PUT,
            &format!("{uri}/status"),
            Some(&alice),
            Some(json!({ "status": "INTERVIEW_SCHEDULED" })),
        )
        .await;
        assert_eq!(json_body(res).await["status"], "INTERVIEW_SCHEDULED");

        let res = call(&app, Method::GET, "/api/v1/jobs/stats", Some(&alice), None).await;
        let stats = json_body(res).await;
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["interviewRate"], 100);

        let res = call(&app, Method::GET, "/api/v1/jobs?status=REJECTED", Some(&alice), None).await;
        assert_eq!(json_body(res).await, json!([]));

        let res = call(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = call(&app, Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn invalid_mood_score_is_a_validation_error() {
        let app = build_app(AppState::fake().await);
        let token = register(&app, "mood@example.com").await;
        let res = call(&app, Method::POST, "/api/v1/mood", Some(&token), Some(json!({ "moodScore": 11 }))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["code"], "VALIDATION_ERROR");

        for score in [6, 8] {
            let res = call(&app, Method::POST, "/api/v1/mood", Some(&token), Some(json!({ "moodScore": score }))).await;
            assert_eq!(res.status(), StatusCode::CREATED);
        }
        let res = call(&app, Method::GET, "/api/v1/mood/summary", Some(&token), None).await;
        let summary = json_body(res).await;
        assert_eq!(summary["count"], 2);
        assert_eq!(summary["averageScore"], 7.0);
    }

    #[tokio::test]
    async fn timer_rejects_illegal_transitions() {
        let app = build_app(AppState::fake().await);
        let token = register(&app, "focus@example.com").await;

        let res = call(&app, Method::POST, "/api/v1/pomodoro/timer/pause", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(res).await["code"], "TIMER_STATE");

        let res = call(
            &app,
            Method::POST,
            "/api/v1/pomodoro/timer/start",
            Some(&token),
            Some(json!({ "taskName": "Resume polish", "category": "JOB_SEARCH" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let snap = json_body(res).await;
        assert_eq!(snap["status"], "running");
        assert_eq!(snap["phase"], "work");

        let res = call(&app, Method::POST, "/api/v1/pomodoro/timer/start", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = call(&app, Method::POST, "/api/v1/pomodoro/timer/reset", Some(&token), None).await;
        let snap = json_body(res).await;
        assert_eq!(snap["status"], "idle");
        assert_eq!(snap["remainingSeconds"], 25 * 60);
    }

    #[tokio::test]
    async fn settings_update_reaches_the_idle_timer() {
        let app = build_app(AppState::fake().await);
        let token = register(&app, "settings@example.com").await;

        let res = call(&app, Method::GET, "/api/v1/pomodoro/timer", Some(&token), None).await;
        assert_eq!(json_body(res).await["remainingSeconds"], 25 * 60);

        let res = call(
            &app,
            Method::PUT,
            "/api/v1/settings",
            Some(&token),
            Some(json!({ "pomodoro": { "workDuration": 50 }, "theme": "dark" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = call(&app, Method::GET, "/api/v1/pomodoro/timer", Some(&token), None).await;
        assert_eq!(json_body(res).await["remainingSeconds"], 50 * 60);

        let res = call(&app, Method::GET, "/api/v1/settings", Some(&token), None).await;
        assert_eq!(json_body(res).await["theme"], "dark");

        let res = call(
            &app,
            Method::PUT,
            "/api/v1/settings",
            Some(&token),
            Some(json!({ "pomodoro": { "workDuration": 0 } })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn finished_work_phase_lands_in_todays_sessions_and_stats() {
        let app = build_app(AppState::fake_with_tick(std::time::Duration::from_millis(1)).await);
        let token = register(&app, "focus@example.com").await;

        let res = call(
            &app,
            Method::PUT,
            "/api/v1/settings",
            Some(&token),
            Some(json!({ "pomodoro": { "workDuration": 1 }, "dailyPomodoroGoal": 4 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = call(
            &app,
            Method::POST,
            "/api/v1/pomodoro/timer/start",
            Some(&token),
            Some(json!({ "taskName": "Cover letter", "category": "JOB_SEARCH" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);

        let mut sessions = Vec::new();
        for _ in 0..500 {
            let res = call(&app, Method::GET, "/api/v1/pomodoro/sessions?today=true", Some(&token), None).await;
            assert_eq!(res.status(), StatusCode::OK);
            sessions = json_body(res).await.as_array().cloned().unwrap_or_default();
            if !sessions.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(sessions.len(), 1, "completed phase was never recorded");
        let session = &sessions[0];
        assert_eq!(session["phase"], "work");
        assert_eq!(session["category"], "JOB_SEARCH");
        assert_eq!(session["taskName"], "Cover letter");
        assert_eq!(session["durationMinutes"], 1);
        assert_eq!(session["completed"], true);
        assert_eq!(session["interrupted"], false);

        let res = call(&app, Method::GET, "/api/v1/pomodoro/stats", Some(&token), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let stats = json_body(res).await;
        assert_eq!(stats["completedSessions"], 1);
        assert_eq!(stats["focusMinutes"], 1);
        assert_eq!(stats["dailyGoal"], 4);
        assert_eq!(stats["goalProgress"], 25.0);

        let other = register(&app, "idle@example.com").await;
        let res = call(&app, Method::GET, "/api/v1/pomodoro/sessions?today=true", Some(&other), None).await;
        assert_eq!(json_body(res).await, json!([]));
    }

    #[tokio::test]
    async fn import_rejects_the_whole_bundle_on_one_bad_record() {
        let app = build_app(AppState::fake().await);
        let token = register(&app, "importer@example.com").await;
        let now = "2024-05-01T09:00:00Z";
        let job = |company: String, position: &str| {
            json!({
                "id": uuid::Uuid::new_v4(),
                "userId": uuid::Uuid::new_v4(),
                "company": company,
                "position": position,
                "status": "APPLIED",
                "priority": "MEDIUM",
                "appliedAt": now,
                "createdAt": now,
                "updatedAt": now
            })
        };
        let session = |minutes: i32| {
            json!({
                "id": uuid::Uuid::new_v4(),
                "userId": uuid::Uuid::new_v4(),
                "phase": "work",
                "category": "WORK",
                "durationMinutes": minutes,
                "completed": true,
                "interrupted": false,
                "completedAt": now
            })
        };

        let bad_bundles = [
            json!({ "jobs": [job("Acme".into(), "Dev"), job(format!("<script>{}", "x".repeat(5000)), "Dev")] }),
            json!({ "jobs": [job("Acme".into(), "")] }),
            json!({ "jobs": [job("Acme".into(), "Dev")], "pomodoroSessions": [session(100_000)] }),
        ];
        for bundle in bad_bundles {
            let res = call(&app, Method::POST, "/api/v1/data/import", Some(&token), Some(bundle)).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(res).await["code"], "VALIDATION_ERROR");
        }

        let res = call(&app, Method::GET, "/api/v1/data/export", Some(&token), None).await;
        let stored = json_body(res).await;
        assert_eq!(stored["jobs"], json!([]));
        assert_eq!(stored["pomodoroSessions"], json!([]));

        let good = json!({ "jobs": [job(" <b>Acme</b> ".into(), "Dev")], "pomodoroSessions": [session(25)] });
        let res = call(&app, Method::POST, "/api/v1/data/import", Some(&token), Some(good)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = call(&app, Method::GET, "/api/v1/data/export", Some(&token), None).await;
        let stored = json_body(res).await;
        assert_eq!(stored["jobs"][0]["company"], "bAcme/b");
        assert_eq!(stored["jobs"][0]["appliedAt"], now);
        assert_eq!(stored["pomodoroSessions"][0]["durationMinutes"], 25);
    }

    #[tokio::test]
    async fn export_then_import_into_another_account() {
        let app = build_app(AppState::fake().await);
        let source = register(&app, "source@example.com").await;
        let target = register(&app, "target@example.com").await;

        call(&app, Method::POST, "/api/v1/jobs", Some(&source), Some(json!({ "company": "Acme", "position": "Dev" }))).await;
        call(
            &app,
            Method::POST,
            "/api/v1/learning",
            Some(&source),
            Some(json!({ "platform": "Coursera", "activity": "Rust", "duration": 90 })),
        )
        .await;
        call(
            &app,
            Method::POST,
            "/api/v1/pomodoro/sessions",
            Some(&source),
            Some(json!({ "duration": 25, "category": "STUDY", "completed": true })),
        )
        .await;

        let res = call(&app, Method::GET, "/api/v1/data/export", Some(&source), None).await;
        let bundle = json_body(res).await;
        assert_eq!(bundle["jobs"].as_array().unwrap().len(), 1);

        let res = call(&app, Method::POST, "/api/v1/data/import", Some(&target), Some(bundle)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let counts = json_body(res).await;
        assert_eq!(counts["jobs"], 1);
        assert_eq!(counts["learningEntries"], 1);
        assert_eq!(counts["pomodoroSessions"], 1);

        let res = call(&app, Method::GET, "/api/v1/dashboard/stats", Some(&target), None).await;
        let stats = json_body(res).await;
        assert_eq!(stats["totalApplications"], 1);
        assert_eq!(stats["totalLearningHours"], 1.5);
        assert_eq!(stats["totalPomodoroSessions"], 1);
    }
}
