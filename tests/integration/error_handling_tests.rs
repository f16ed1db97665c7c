//! Failure classification and retry behaviour of the HTTP layer

mod common;

use std::time::Duration;

use common::{create_mock_client, efetch_body, esearch_body};
use medline_fetcher::{
    ClientConfig, ErrorKind, MedlineClient, MedlineError, QueryNode, RetryConfig,
};
use rstest::rstest;
use tracing_test::traced_test;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[rstest]
#[case(500)]
#[case(502)]
#[case(503)]
#[tokio::test]
async fn test_server_errors_are_retried_then_reported(#[case] status: u16) {
    let mock_server = MockServer::start().await;
    // one attempt plus two retries
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(status))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client.search_ids("cancer").await.unwrap_err();

    assert!(matches!(err, MedlineError::ApiError { status: s, .. } if s == status));
    assert_eq!(err.kind(), ErrorKind::Retrieval);
    assert_eq!(err.user_message(), "Error while fetching from Medline");
}

#[tokio::test]
#[traced_test]
async fn test_retries_are_logged() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let _ = client.fetch_records(&["1"]).await;

    assert!(logs_contain("Transient failure, retrying"));
    assert!(logs_contain("Server error"));
}

#[tokio::test]
#[traced_test]
async fn test_client_errors_are_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client.fetch_records(&["1"]).await.unwrap_err();

    assert!(matches!(err, MedlineError::ApiError { status: 400, .. }));
    assert!(err.is_retrieval());
}

#[tokio::test]
#[traced_test]
async fn test_rate_limited_response() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client.search_ids("cancer").await.unwrap_err();

    assert!(matches!(err, MedlineError::RateLimitExceeded));
    assert!(err.is_retrieval());
}

#[tokio::test]
#[traced_test]
async fn test_recovers_after_transient_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_body(1, &["5"])))
        .with_priority(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(efetch_body(&[("5", "Five")])))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let records = client
        .perform_search(&QueryNode::unfielded("cancer"))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].pmid(), Some("5"));
}

#[tokio::test]
#[traced_test]
async fn test_retry_disabled() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_base_url(mock_server.uri())
            .with_rate_limit(100.0)
            .with_retry_config(RetryConfig::disabled()),
    );

    assert!(client.search_ids("cancer").await.is_err());
}

#[tokio::test]
#[traced_test]
async fn test_connection_refused_is_retrieval_error() {
    // nothing listens on the discard port
    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_base_url("http://127.0.0.1:9")
            .with_rate_limit(100.0)
            .with_retry_config(RetryConfig::disabled()),
    );

    let err = client
        .perform_search(&QueryNode::field("author", "Smith"))
        .await
        .unwrap_err();

    assert!(matches!(err, MedlineError::RequestError(_)));
    assert_eq!(err.kind(), ErrorKind::Retrieval);
}

#[tokio::test]
#[traced_test]
async fn test_timeout_is_retrieval_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(esearch_body(1, &["1"]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_base_url(mock_server.uri())
            .with_rate_limit(100.0)
            .with_timeout(Duration::from_millis(200))
            .with_retry_config(RetryConfig::disabled()),
    );

    let err = client.search_ids("cancer").await.unwrap_err();
    assert!(err.is_retrieval());
}

#[tokio::test]
#[traced_test]
async fn test_malformed_query_fails_before_network() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client.search("author:(Smith").await.unwrap_err();

    assert!(matches!(err, MedlineError::InvalidQuery(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
#[traced_test]
async fn test_deeply_nested_query_is_invalid_input() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let query = format!("{}cancer{}", "(".repeat(5_000), ")".repeat(5_000));
    let err = client.search(&query).await.unwrap_err();

    assert!(matches!(err, MedlineError::InvalidQuery(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
#[traced_test]
async fn test_search_parse_failure_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<eSearchResult><IdList><Id>1</Id></IdList></eSearchResult>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let err = client
        .perform_search(&QueryNode::unfielded("cancer"))
        .await
        .unwrap_err();

    assert!(matches!(err, MedlineError::MissingCount));
    assert_eq!(err.kind(), ErrorKind::Parse);
}
