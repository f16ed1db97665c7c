//! Identifier search against a mocked ESearch endpoint

mod common;

use common::{create_mock_client, esearch_body, esearch_xml};
use medline_fetcher::{ClientConfig, MedlineClient, MedlineError};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_esearch_mock(body: String) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/xml"),
        )
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
#[traced_test]
async fn test_count_and_ids_in_order() {
    let mock_server = setup_esearch_mock(esearch_xml("count_120")).await;
    let client = create_mock_client(&mock_server);

    let result = client.search_ids("au:Smith").await.unwrap();

    assert_eq!(result.total_count, 120);
    assert_eq!(result.ids, vec!["31978945", "32887691", "25760099"]);
    assert!(result.is_truncated());
}

#[tokio::test]
#[traced_test]
async fn test_request_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("db", "pubmed"))
        .and(query_param("sort", "relevance"))
        .and(query_param("retmax", "50"))
        .and(query_param("term", "au:Smith AND sd:2018 AND ed:2018"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_body(1, &["42"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let result = client
        .search_ids("au:Smith AND sd:2018 AND ed:2018")
        .await
        .unwrap();

    assert_eq!(result.ids, vec!["42"]);
}

#[tokio::test]
#[traced_test]
async fn test_api_parameters_are_appended() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("api_key", "secret"))
        .and(query_param("email", "researcher@university.edu"))
        .and(query_param("tool", "medline-fetcher"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_body(0, &[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_base_url(mock_server.uri())
            .with_api_key("secret")
            .with_email("researcher@university.edu")
            .with_rate_limit(100.0),
    );

    client.search_ids("cancer").await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_retmax_follows_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("retmax", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(esearch_body(0, &[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_base_url(mock_server.uri())
            .with_rate_limit(100.0)
            .with_max_results(5),
    );

    client.search_ids("cancer").await.unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_empty_id_list_is_not_an_error() {
    let mock_server = setup_esearch_mock(esearch_xml("no_results")).await;
    let client = create_mock_client(&mock_server);

    let result = client.search_ids("zzqxv").await.unwrap();

    assert!(result.ids.is_empty());
    assert_eq!(result.total_count, 0);
}

#[tokio::test]
#[traced_test]
async fn test_blank_query_makes_no_request() {
    let mock_server = MockServer::start().await;
    let client = create_mock_client(&mock_server);

    let result = client.search_ids("   ").await.unwrap();
    assert!(result.is_empty());

    let received_requests = mock_server.received_requests().await.unwrap();
    assert_eq!(received_requests.len(), 0);
}

#[tokio::test]
#[traced_test]
async fn test_server_error_element() {
    let mock_server = setup_esearch_mock(esearch_xml("error")).await;
    let client = create_mock_client(&mock_server);

    let err = client.search_ids("((cancer").await.unwrap_err();

    match &err {
        MedlineError::ApiError { status, message } => {
            assert_eq!(*status, 200);
            assert!(message.contains("unbalanced parentheses"));
        }
        other => panic!("expected ApiError, got {other:?}"),
    }
    assert!(err.is_retrieval());
}

#[tokio::test]
#[traced_test]
async fn test_malformed_count_is_parse_error() {
    let mock_server = setup_esearch_mock(
        "<eSearchResult><Count>many</Count><IdList><Id>1</Id></IdList></eSearchResult>"
            .to_string(),
    )
    .await;
    let client = create_mock_client(&mock_server);

    let err = client.search_ids("cancer").await.unwrap_err();

    assert!(err.is_parse());
    assert_eq!(err.user_message(), "Error while parsing ID list");
}

#[tokio::test]
#[traced_test]
async fn test_truncated_body_is_parse_error() {
    let mock_server = setup_esearch_mock(
        "<eSearchResult><Count>3</Count><IdList><Id>1</Id><Id>2</Id>".to_string(),
    )
    .await;
    let client = create_mock_client(&mock_server);

    let err = client.search_ids("cancer").await.unwrap_err();
    assert!(err.is_parse());
}

#[tokio::test]
#[traced_test]
async fn test_body_after_id_list_is_ignored() {
    let body = format!(
        "<eSearchResult><Count>2</Count><IdList><Id>7</Id><Id>8</Id></IdList>{}<Unclosed>",
        "<TranslationStack>".repeat(1000)
    );
    let mock_server = setup_esearch_mock(body).await;
    let client = create_mock_client(&mock_server);

    let result = client.search_ids("cancer").await.unwrap();
    assert_eq!(result.ids, vec!["7", "8"]);
    assert_eq!(result.total_count, 2);
}
