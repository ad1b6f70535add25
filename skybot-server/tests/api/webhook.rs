use std::time::Duration;

use skybot_core::claims::DEFAULT_ISSUER;
use skybot_core::testing::{self, TestIssuer};

use crate::{message_json, message_json_for, now, TestApp, APP_ID};

const STRICT_TRANSPORT_SECURITY: &str = "strict-transport-security";

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn accepts_authorized_activity() {
    let app = TestApp::start().await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        "max-age=63072000; includeSubDomains",
        response.headers()[STRICT_TRANSPORT_SECURITY]
    );

    let activities = app.handler().activities().await;
    assert_eq!(1, activities.len());
    assert_eq!("message", activities[0].activity_type);
    assert_eq!("hello", activities[0].text);
    assert_eq!(testing::SERVICE_URL, activities[0].service_url);
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_missing_authorization() {
    let app = TestApp::start().await;

    let response = app
        .post_activity(None, &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    assert!(app.handler().activities().await.is_empty());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_before_reading_body() {
    let app = TestApp::start().await;

    let response = app
        .post_activity(Some("Bearer nope"), "not json")
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn rejects_body_that_is_not_an_activity() {
    let app = TestApp::start().await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    let response = app.post_activity(Some(&bearer), "not json").await.unwrap();

    assert_eq!(400, response.status().as_u16());
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    assert!(app.handler().activities().await.is_empty());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_wrong_audience() {
    let app = TestApp::start().await;
    let claims = testing::claims(DEFAULT_ISSUER, "some-other-bot", now() + 3600);
    let bearer = app.bearer(&claims).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_wrong_issuer() {
    let app = TestApp::start().await;
    let claims = testing::claims("https://sts.windows.net/", APP_ID, now() + 3600);
    let bearer = app.bearer(&claims).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_expired_token() {
    let app = TestApp::start().await;
    let claims = testing::claims(DEFAULT_ISSUER, APP_ID, now() - 60);
    let bearer = app.bearer(&claims).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_tampered_token() {
    let app = TestApp::start().await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();
    let segments: Vec<&str> = bearer.split('.').collect();
    let forged_payload = base64::encode_config(
        serde_json::to_string(&testing::claims(DEFAULT_ISSUER, APP_ID, now() + 86400)).unwrap(),
        base64::URL_SAFE_NO_PAD,
    );
    let forged = format!("{}.{}.{}", segments[0], forged_payload, segments[2]);

    let response = app
        .post_activity(Some(&forged), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_when_keys_unavailable() {
    let app = TestApp::builder().key_status(503).start().await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn fetches_keys_for_every_call_without_cache() {
    let app = TestApp::builder().expect_key_fetches(2).start().await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    for _ in 0..2 {
        let response = app
            .post_activity(Some(&bearer), &message_json("hello"))
            .await
            .unwrap();
        assert_eq!(200, response.status().as_u16());
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn reuses_cached_keys() {
    let app = TestApp::builder()
        .key_cache_ttl(Duration::from_secs(300))
        .expect_key_fetches(1)
        .start()
        .await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    for _ in 0..3 {
        let response = app
            .post_activity(Some(&bearer), &message_json("hello"))
            .await
            .unwrap();
        assert_eq!(200, response.status().as_u16());
    }
    assert_eq!(3, app.handler().activities().await.len());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refreshes_cached_keys_for_unknown_key() {
    let app = TestApp::builder()
        .key_cache_ttl(Duration::from_secs(300))
        .min_key_refresh_interval(Duration::ZERO)
        .expect_key_fetches(2)
        .start()
        .await;
    let stranger = TestIssuer::new("unknown-key").unwrap();
    let bearer = stranger.bearer(&app.valid_claims()).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn omits_strict_transport_security_when_disabled() {
    let app = TestApp::builder()
        .without_strict_transport_security()
        .start()
        .await;

    let response = app
        .post_activity(None, &message_json("hello"))
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
    assert!(!response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn unknown_keys_do_not_flush_fresh_cache() {
    let app = TestApp::builder()
        .key_cache_ttl(Duration::from_secs(300))
        .expect_key_fetches(1)
        .start()
        .await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    for i in 0..5 {
        let stranger = TestIssuer::new(&format!("unknown-key-{}", i)).unwrap();
        let forged = stranger.bearer(&app.valid_claims()).unwrap();
        let response = app
            .post_activity(Some(&forged), &message_json("hello"))
            .await
            .unwrap();
        assert_eq!(403, response.status().as_u16());
    }

    let response = app
        .post_activity(Some(&bearer), &message_json("hello"))
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    assert_eq!(2, app.handler().activities().await.len());
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
pub async fn refuses_service_url_the_token_was_not_issued_for() {
    let app = TestApp::start().await;
    let bearer = app.bearer(&app.valid_claims()).unwrap();

    let response = app
        .post_activity(
            Some(&bearer),
            &message_json_for("https://attacker.example/", "hello"),
        )
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    assert!(app.handler().activities().await.is_empty());
}
