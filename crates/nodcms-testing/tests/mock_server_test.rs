use http::{Method, StatusCode};
use nodcms_testing::{MockReply, MockServer, RequestMatcher};
use serde_json::Value;
use std::time::Duration;

#[tokio::test]
async fn test_site_verify_reply() {
    let server = MockServer::start().await.unwrap();
    server
        .reply_to_site_verify(MockReply::verified("example.com"))
        .once();

    let client = reqwest::Client::new();
    let resp = client
        .post(server.verify_url())
        .form(&[("secret", "s3cret"), ("response", "token")])
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["hostname"], "example.com");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].form_value("secret"), Some("s3cret"));
    assert_eq!(requests[0].form_value("response"), Some("token"));

    server.verify();
}

#[tokio::test]
async fn test_form_matching() {
    let server = MockServer::start().await.unwrap();
    server
        .expect(
            RequestMatcher::site_verify()
                .form_field("secret", "right")
                .form_field("response", "token"),
        )
        .respond_with(MockReply::verified("example.com"));

    let client = reqwest::Client::new();

    let resp = client
        .post(server.verify_url())
        .form(&[("secret", "right"), ("response", "token")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(server.verify_url())
        .form(&[("secret", "wrong"), ("response", "token")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.unmatched_count(), 1);
}

#[tokio::test]
async fn test_delayed_reply_trips_client_timeout() {
    let server = MockServer::start().await.unwrap();
    server.reply_to_site_verify(MockReply::verified("example.com").delay(Duration::from_millis(500)));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let err = client.post(server.verify_url()).send().await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_later_expectations_override() {
    let server = MockServer::start().await.unwrap();
    server
        .expect(RequestMatcher::new().method(Method::POST))
        .respond_with(MockReply::new().status(StatusCode::BAD_GATEWAY));
    server
        .expect(RequestMatcher::new().method(Method::POST))
        .respond_with(MockReply::new().status(StatusCode::ACCEPTED))
        .times(1);

    let resp = reqwest::Client::new()
        .post(server.base_url())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    server.verify();
}

#[tokio::test]
#[should_panic]
async fn test_verification_failure() {
    let server = MockServer::start().await.unwrap();
    server.reply_to_site_verify(MockReply::verified("example.com")).once();

    // No call made
    server.verify();
}
