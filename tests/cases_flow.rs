mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct CaseBody {
    id: i32,
    title: String,
    phone: String,
    creator_id: Option<i32>,
}

fn case_payload(title: &str, phone: &str) -> Value {
    json!({
        "title": title,
        "details": "D",
        "full_name": "N",
        "phone": phone,
    })
}

#[tokio::test]
async fn case_ownership_and_phone_uniqueness() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let a_id = app.insert_user("user_a", "a.pass", false).await?;
    app.insert_user("user_b", "b.pass", false).await?;
    app.insert_user("boss", "boss.pw", true).await?;
    let a = app.login_token("user_a", "a.pass").await?;
    let b = app.login_token("user_b", "b.pass").await?;
    let boss = app.login_token("boss", "boss.pw").await?;

    let response = app
        .post_json("/api/cases", &case_payload("T", "555-0100"), Some(&a))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let case: CaseBody = body_json(response).await?;
    assert_eq!(case.title, "T");
    assert_eq!(case.creator_id, Some(a_id));

    let response = app
        .post_json("/api/cases", &case_payload("Other", "555-0100"), Some(&a))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(response).await?;
    assert_eq!(body["error"], "case already exists");

    let path = format!("/api/cases/{}", case.id);
    let response = app
        .put_json(&path, &case_payload("T2", "555-0100"), Some(&b))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .put_json(&path, &case_payload("Edited by admin", "555-0100"), Some(&boss))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let edited: CaseBody = body_json(response).await?;
    assert_eq!(edited.title, "Edited by admin");
    assert_eq!(edited.phone, "555-0100");
    assert_eq!(edited.creator_id, Some(a_id));

    let response = app.delete(&path, Some(&b)).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app.delete(&path, Some(&a)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.get(&path, Some(&a)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_case_form_lists_every_field() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("clerk", "clerk.pw", false).await?;
    let token = app.login_token("clerk", "clerk.pw").await?;

    let response = app
        .post_json(
            "/api/cases",
            &json!({
                "title": "",
                "details": "x".repeat(101),
                "full_name": "O'Brien",
                "phone": "555-0101",
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = body_json(response).await?;
    assert_eq!(body["error"], "invalid form");
    assert_eq!(
        body["fields"],
        json!([
            { "field": "title", "reason": { "code": "required" } },
            { "field": "details", "reason": { "code": "too_long", "max": 100 } },
            { "field": "full_name", "reason": { "code": "forbidden_pattern" } },
        ])
    );

    let response = app.get("/api/cases", Some(&token)).await?;
    let cases: Vec<Value> = body_json(response).await?;
    assert!(cases.is_empty());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn case_search_matches_text_and_id() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_user("clerk", "clerk.pw", false).await?;
    let token = app.login_token("clerk", "clerk.pw").await?;

    let first: CaseBody = body_json(
        app.post_json("/api/cases", &case_payload("Lease dispute", "555-0200"), Some(&token))
            .await?,
    )
    .await?;
    app.post_json("/api/cases", &case_payload("Custody 50%", "555-0201"), Some(&token))
        .await?;

    let hits: Vec<CaseBody> =
        body_json(app.get("/api/cases/search?q=lease", Some(&token)).await?).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, first.id);

    let hits: Vec<CaseBody> =
        body_json(app.get("/api/cases/search?q=50%25", Some(&token)).await?).await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Custody 50%");

    let hits: Vec<CaseBody> = body_json(
        app.get(&format!("/api/cases/search?q={}", first.id), Some(&token))
            .await?,
    )
    .await?;
    assert!(hits.iter().any(|case| case.id == first.id));

    // Ids match as text, so a leading digit finds the case too.
    let id_text = first.id.to_string();
    let hits: Vec<CaseBody> = body_json(
        app.get(&format!("/api/cases/search?q={}", &id_text[..1]), Some(&token))
            .await?,
    )
    .await?;
    assert!(hits.iter().any(|case| case.id == first.id));

    let hits: Vec<CaseBody> =
        body_json(app.get("/api/cases/search?q=", Some(&token)).await?).await?;
    assert_eq!(hits.len(), 2);

    let response = app
        .get("/api/cases/search?q=x%27%20or%201%3D1", Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}
