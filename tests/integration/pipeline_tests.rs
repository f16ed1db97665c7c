//! Search, fetch and cleanup end to end against mocked E-utilities

mod common;

use common::{create_mock_client, efetch_body, esearch_body, esearch_xml, medline_xml};
use medline_fetcher::{ClientConfig, Field, MedlineClient, Provider, QueryNode};
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_esearch(mock_server: &MockServer, term: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", term))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(mock_server)
        .await;
}

async fn mount_efetch(mock_server: &MockServer, ids: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", ids))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(mock_server)
        .await;
}

#[tokio::test]
#[traced_test]
async fn test_author_search_end_to_end() {
    let mock_server = MockServer::start().await;
    mount_esearch(&mock_server, "au:Smith", esearch_body(2, &["100", "200"])).await;
    mount_efetch(
        &mock_server,
        "100,200",
        efetch_body(&[("100", "First study"), ("200", "Second study")]),
    )
    .await;

    let client = create_mock_client(&mock_server);
    let records = client
        .perform_search(&QueryNode::field("author", "Smith"))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(!record.has_field(&Field::Status));
        assert!(!record.has_field(&Field::Copyright));
        assert!(!record.has_field(&Field::JournalAbbreviation));
        assert_eq!(record.get_text(&Field::Month), Some("mar"));
        assert_eq!(
            record.get_names(&Field::Author),
            Some(&["Smith, J. A.".to_string()][..])
        );
    }
    assert_eq!(records[0].pmid(), Some("100"));
    assert_eq!(records[1].pmid(), Some("200"));
}

#[tokio::test]
#[traced_test]
async fn test_search_parses_query_text() {
    let mock_server = MockServer::start().await;
    mount_esearch(
        &mock_server,
        "au:Smith AND sd:2018 AND ed:2018",
        esearch_body(1, &["31978945"]),
    )
    .await;
    mount_efetch(&mock_server, "31978945", medline_xml("31978945")).await;

    let client = create_mock_client(&mock_server);
    let records = client.search("author:Smith year:2018").await.unwrap();

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.pmid(), Some("31978945"));
    assert_eq!(record.get_text(&Field::Journal), Some("Nature"));
    assert_eq!(record.get_text(&Field::Month), Some("mar"));
    assert!(!record.has_field(&Field::Status));
    assert!(!record.has_field(&Field::Copyright));
}

#[tokio::test]
#[traced_test]
async fn test_untranslatable_query_makes_no_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);

    let records = client
        .perform_search(&QueryNode::field("year", "recent"))
        .await
        .unwrap();
    assert!(records.is_empty());

    assert!(client.search("").await.unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_no_results_skips_fetch() {
    let mock_server = MockServer::start().await;
    mount_esearch(&mock_server, "zzqxv", esearch_xml("no_results")).await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let outcome = client
        .perform_search_detailed(&QueryNode::unfielded("zzqxv"))
        .await
        .unwrap();

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.total_count, 0);
    assert!(!outcome.truncated);
    assert!(logs_contain("No results found."));
}

#[tokio::test]
#[traced_test]
async fn test_large_result_set_is_truncated_to_cap() {
    let mock_server = MockServer::start().await;
    mount_esearch(&mock_server, "cancer", esearch_body(120, &["1", "2", "3"])).await;
    mount_efetch(
        &mock_server,
        "1,2,3",
        efetch_body(&[("1", "One"), ("2", "Two"), ("3", "Three")]),
    )
    .await;

    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_base_url(mock_server.uri())
            .with_rate_limit(100.0)
            .with_max_results(3),
    );
    let outcome = client
        .perform_search_detailed(&QueryNode::unfielded("cancer"))
        .await
        .unwrap();

    assert_eq!(outcome.records.len(), 3);
    assert_eq!(outcome.total_count, 120);
    assert!(outcome.truncated);
    assert!(logs_contain("120 results found. Only 3 relevant results will be fetched."));
}

#[tokio::test]
#[traced_test]
async fn test_total_count_is_per_call() {
    let mock_server = MockServer::start().await;
    mount_esearch(&mock_server, "au:Smith", esearch_body(75, &["1"])).await;
    mount_esearch(&mock_server, "au:Jones", esearch_body(1, &["2"])).await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(efetch_body(&[("1", "A")])))
        .mount(&mock_server)
        .await;

    let client = create_mock_client(&mock_server);
    let smith = client
        .perform_search_detailed(&QueryNode::field("author", "Smith"))
        .await
        .unwrap();
    let jones = client
        .clone()
        .perform_search_detailed(&QueryNode::field("author", "Jones"))
        .await
        .unwrap();

    assert_eq!(smith.total_count, 75);
    assert!(smith.truncated);
    assert_eq!(jones.total_count, 1);
    assert!(!jones.truncated);
}

#[tokio::test]
#[traced_test]
async fn test_fetch_by_id_skips_search() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_efetch(&mock_server, "32887691", medline_xml("32887691")).await;

    let client = create_mock_client(&mock_server);
    let record = client
        .fetch_by_id("32887691")
        .await
        .unwrap()
        .expect("record should be found");

    assert_eq!(record.pmid(), Some("32887691"));
    assert_eq!(record.get_text(&Field::Year), Some("2020"));
    assert_eq!(record.get_text(&Field::Month), Some("sep"));
    assert!(!record.has_field(&Field::Status));
    assert_eq!(
        record.get_names(&Field::Author),
        Some(
            &[
                "van der Berg, Anna M.".to_string(),
                "Okafor, C. N.".to_string(),
                "{Open Science Consortium}".to_string(),
            ][..]
        )
    );
}

#[tokio::test]
#[traced_test]
async fn test_fetch_by_id_not_found() {
    let mock_server = MockServer::start().await;
    mount_efetch(
        &mock_server,
        "99999999",
        r#"<?xml version="1.0" ?><PubmedArticleSet></PubmedArticleSet>"#.to_string(),
    )
    .await;

    let client = create_mock_client(&mock_server);
    assert!(client.fetch_by_id("99999999").await.unwrap().is_none());
}

#[tokio::test]
#[traced_test]
async fn test_entrez_provider_sends_tagged_query() {
    let mock_server = MockServer::start().await;
    mount_esearch(&mock_server, "Smith[au] AND 2018[dp]", esearch_body(0, &[])).await;

    let client = create_mock_client(&mock_server).with_provider(Provider::PUBMED_ENTREZ);
    let records = client.search("author:Smith AND year:2018").await.unwrap();

    assert!(records.is_empty());
}

#[cfg(feature = "integration-tests")]
#[tokio::test]
async fn test_real_api_search() {
    if !common::should_run_real_api_tests() {
        return;
    }
    common::init_live_logging();

    let client = MedlineClient::with_config(
        ClientConfig::new()
            .with_email("test@example.com")
            .with_tool("medline-fetcher-integration-tests")
            .with_rate_limit(2.0)
            .with_max_results(3),
    )
    .with_provider(Provider::PUBMED_ENTREZ);

    let outcome = client
        .perform_search_detailed(&QueryNode::and(vec![
            QueryNode::unfielded("coronavirus"),
            QueryNode::field("year", "2020"),
        ]))
        .await
        .expect("live search should succeed");

    assert!(outcome.records.len() <= 3);
    assert!(outcome.total_count >= outcome.records.len());
}
