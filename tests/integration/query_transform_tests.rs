//! Query text to provider syntax, through the public API

use medline_fetcher::query::{QueryNode, QuerySyntax, QueryTransformer, parse_query};
use medline_fetcher::{MedlineClient, Provider};
use rstest::rstest;

fn medline(input: &str) -> Option<String> {
    let tree = parse_query(input).expect("query should parse");
    QueryTransformer::new(&QuerySyntax::MEDLINE).transform(&tree)
}

fn entrez(input: &str) -> Option<String> {
    let tree = parse_query(input).expect("query should parse");
    QueryTransformer::new(&QuerySyntax::ENTREZ).transform(&tree)
}

#[rstest]
#[case("author:Smith", "au:Smith")]
#[case("title:\"deep learning\"", "ti:\"deep learning\"")]
#[case("journal:Nature", "pt:Nature")]
#[case("cancer", "cancer")]
#[case("year:2018", "sd:2018 AND ed:2018")]
#[case("year-range:2018-2021", "sd:2018 AND ed:2021")]
#[case("year:[2015 TO *]", "sd:2015")]
#[case("author:Smith year:2018", "au:Smith AND sd:2018 AND ed:2018")]
#[case("author:Smith OR author:Jones", "au:Smith OR au:Jones")]
#[case(
    "(author:Smith OR author:Jones) AND cancer",
    "(au:Smith OR au:Jones) AND cancer"
)]
#[case("year:2018 OR title:rna", "(sd:2018 AND ed:2018) OR ti:rna")]
#[case("cancer -author:Smith", "cancer AND NOT au:Smith")]
#[case("NOT (mice OR rats)", "NOT (mice OR rats)")]
#[case("title:(rna OR dna)", "ti:rna OR ti:dna")]
fn test_medline_translation(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(medline(input).as_deref(), Some(expected));
}

#[rstest]
#[case("author:Smith", "Smith[au]")]
#[case("year:2018", "2018[dp]")]
#[case("year-range:2018-2021", "2018:2021[dp]")]
#[case("year-range:-2000", "1800:2000[dp]")]
#[case("author:Smith language:eng", "Smith[au] AND eng[language]")]
fn test_entrez_translation(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(entrez(input).as_deref(), Some(expected));
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("year:recent")]
#[case("year-range:soon")]
#[case("NOT year:someday")]
#[case("year:old OR year-range:x-y")]
fn test_nothing_translatable(#[case] input: &str) {
    assert_eq!(medline(input), None);
}

#[test]
fn test_untranslatable_terms_are_dropped_from_larger_queries() {
    assert_eq!(
        medline("author:Smith AND year:recent").as_deref(),
        Some("au:Smith")
    );
    assert_eq!(
        medline("(year:recent OR year:later) AND cancer").as_deref(),
        Some("cancer")
    );
}

#[test]
fn test_transform_does_not_change_the_tree() {
    let tree = parse_query("author:Smith AND year:2018").unwrap();
    let before = tree.clone();
    let transformer = QueryTransformer::new(&QuerySyntax::MEDLINE);

    let first = transformer.transform(&tree);
    let second = transformer.transform(&tree);

    assert_eq!(tree, before);
    assert_eq!(first, second);
}

#[test]
fn test_client_transform_follows_provider() {
    let tree = QueryNode::field("year-range", "2018-2021");

    assert_eq!(
        MedlineClient::new().transform(&tree).as_deref(),
        Some("sd:2018 AND ed:2021")
    );
    assert_eq!(
        MedlineClient::new()
            .with_provider(Provider::PUBMED_ENTREZ)
            .transform(&tree)
            .as_deref(),
        Some("2018:2021[dp]")
    );
}

#[rstest]
#[case("author:")]
#[case("(cancer")]
#[case("title:\"unterminated")]
#[case("cancer AND")]
fn test_malformed_queries_are_invalid_input(#[case] input: &str) {
    let err = parse_query(input).unwrap_err();
    assert_eq!(err.kind(), medline_fetcher::ErrorKind::InvalidInput);
}
