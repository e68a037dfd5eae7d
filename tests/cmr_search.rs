mod common;

use common::{atl07_request, client_for, granule_feed};
use nsidc_access::{DEFAULT_FIELDS, Error};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn granule_search_counts_and_sums_sizes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/granules.json"))
        .and(query_param("short_name", "ATL07"))
        .and(query_param("version", "002"))
        .and(query_param("bounding_box", "140,72,153,80"))
        .and(query_param("temporal", "2019-03-23T00:00:00Z,2019-03-23T23:59:59Z"))
        .and(query_param("page_num", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(granule_feed(&[
            "260.6034698486",
            "261.1654319763",
            "260.1711292267",
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search/granules.json"))
        .and(query_param("page_num", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(granule_feed(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let summary = tokio::task::spawn_blocking(move || client_for(&uri).search_granules(&atl07_request()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.count(), 3);
    assert!((summary.total_size_mb() - 781.94).abs() < 0.01);
    assert!((summary.mean_size_mb().unwrap() - 260.65).abs() < 0.01);
}

#[tokio::test(flavor = "multi_thread")]
async fn collections_and_latest_version() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/collections.json"))
        .and(query_param("short_name", "ATL07"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "feed": { "entry": [
                { "dataset_id": "ATLAS/ICESat-2 L3A Sea Ice Height V001", "version_id": "001" },
                { "dataset_id": "ATLAS/ICESat-2 L3A Sea Ice Height V002", "version_id": "002" }
            ]}
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (entries, latest) = tokio::task::spawn_blocking(move || {
        let client = client_for(&uri);
        let entries = client.search_collections("ATL07")?;
        let latest = client.latest_version("ATL07")?;
        Ok::<_, Error>((entries, latest))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[1].describe(&DEFAULT_FIELDS),
        "dataset_id: ATLAS/ICESat-2 L3A Sea Ice Height V002, version_id: 002"
    );
    assert_eq!(latest, "002");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_collection_has_no_latest_version() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/collections.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"feed": {"entry": []}})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || client_for(&uri).latest_version("NOPE"))
        .await
        .unwrap();

    assert!(matches!(result, Err(Error::InvalidRequest(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn cmr_errors_propagate() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/granules.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || client_for(&uri).search_granules(&atl07_request()))
        .await
        .unwrap();

    assert!(matches!(result, Err(Error::Http(_))));
}
