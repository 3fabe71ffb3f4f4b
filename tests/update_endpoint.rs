use actix_web::{
    App,
    http::{StatusCode, header},
    test, web,
};
use base64::{Engine, prelude::BASE64_STANDARD};
use serde_json::{Value, json};
use vue_page::{api::Api, pages, token::TokenManager};

const SECRET: &str = "integration-test-secret";

macro_rules! app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Api::new(pages::registry().unwrap())))
                .app_data(web::Data::new(TokenManager::new(SECRET)))
                .configure(Api::configure),
        )
        .await
    };
}

fn counter_snapshot(count: i64) -> String {
    json!({"count": count, "step": 1, "name": null, "history": []}).to_string()
}

fn bearer(user: &str, roles: &[&str]) -> (header::HeaderName, String) {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    let token = TokenManager::new(SECRET).create_token(user, &roles).unwrap();

    (header::AUTHORIZATION, format!("Bearer {token}"))
}

#[tokio::test]
async fn update_returns_changed_fields_only() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .set_json(json!({
            "snapshot": counter_snapshot(1),
            "method": "add",
            "parameters": [41]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({"update": {"count": 42, "history": [42]}, "js": ""}));
}

#[tokio::test]
async fn role_restricted_action_without_token_is_forbidden() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .set_json(json!({"snapshot": counter_snapshot(5), "method": "reset"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_restricted_action_with_wrong_role_is_forbidden() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .insert_header(bearer("bob", &["User"]))
        .set_json(json!({"snapshot": counter_snapshot(5), "method": "reset"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = test::read_body(res).await;
    assert!(String::from_utf8_lossy(&body).contains("requires one of [Admin]"));
}

#[tokio::test]
async fn admin_token_may_reset() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .insert_header(bearer("ann", &["Admin"]))
        .set_json(json!({"snapshot": counter_snapshot(5), "method": "reset"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["update"], json!({"count": 0}));
    assert_eq!(body["js"], "alert('Counter reset');");
}

#[tokio::test]
async fn invalid_token_counts_as_anonymous() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .insert_header((header::AUTHORIZATION, "Bearer not-a-token"))
        .set_json(json!({"snapshot": counter_snapshot(1), "method": "increment"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["update"]["count"], 2);
}

#[tokio::test]
async fn bad_arguments_are_a_bad_request() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .set_json(json!({
            "snapshot": counter_snapshot(1),
            "method": "add",
            "parameters": ["many"]
        }))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_snapshot_is_a_bad_request() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .set_json(json!({"snapshot": "{", "method": "increment"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_method_is_a_server_error() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/counter/update")
        .set_json(json!({"snapshot": counter_snapshot(1), "method": "explode"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unknown_page_is_not_found() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/nope/update")
        .set_json(json!({"snapshot": "{}", "method": "increment"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_files_bind_to_attachment_parameter() {
    let app = app!();

    let req = test::TestRequest::post()
        .uri("/profile/update")
        .set_json(json!({
            "snapshot": {"user": "ann", "display_name": "", "avatar": null},
            "method": "rename",
            "parameters": ["Ann"],
            "files": [{"name": "me.png", "content_type": "image/png", "data": BASE64_STANDARD.encode([1u8, 2, 3])}]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["update"]["display_name"], "Ann");
    assert_eq!(
        body["update"]["avatar"],
        json!({"file_name": "me.png", "content_type": "image/png", "size": 3})
    );
    assert_eq!(body["js"], "console.log('profile of ann renamed');");
}

#[tokio::test]
async fn multipart_upload_binds_files() {
    let app = app!();
    let boundary = "vue-page-boundary";
    let payload = format!(
        "--{b}\r\n\
         Content-Disposition: form-data; name=\"snapshot\"\r\n\r\n\
         {{\"user\":\"ann\",\"documents\":[]}}\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"method\"\r\n\r\n\
         attach_all\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"parameters\"\r\n\r\n\
         []\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"a.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         first\r\n\
         --{b}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"b.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         second\r\n\
         --{b}--\r\n",
        b = boundary
    );

    let req = test::TestRequest::post()
        .uri("/profile/upload")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        ))
        .set_payload(payload)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["update"]["documents"], json!(["a.txt", "b.txt"]));
}
