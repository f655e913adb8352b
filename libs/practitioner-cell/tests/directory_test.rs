use assert_matches::assert_matches;
use serde_json::json;
use tokio_test::assert_ok;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use practitioner_cell::{PractitionerDirectory, SupabasePractitionerDirectory};
use shared_database::{DirectoryError, SupabaseError};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

async fn directory(mock_server: &MockServer) -> SupabasePractitionerDirectory {
    SupabasePractitionerDirectory::new(&TestConfig::with_supabase(&mock_server.uri()).to_app_config())
}

#[tokio::test]
async fn find_by_id_reads_single_row() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/practitioners"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::practitioner_row(id, "Ana Ruiz", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;

    let practitioner = directory(&mock_server).await.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(practitioner.id, id);
    assert_eq!(practitioner.name, "Ana Ruiz");
    assert_eq!(practitioner.specialty, "Cardiology");
}

#[tokio::test]
async fn missing_practitioner_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/practitioners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let directory = directory(&mock_server).await;
    let id = Uuid::new_v4();
    assert!(assert_ok!(directory.find_by_id(id).await).is_none());
    assert!(!assert_ok!(directory.exists_by_id(id).await));
}

#[tokio::test]
async fn list_all_is_ordered_by_id() {
    let mock_server = MockServer::start().await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/practitioners"))
        .and(query_param("order", "id.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::practitioner_row(first, "Ana Ruiz", "Cardiology"),
            MockSupabaseResponses::practitioner_row(second, "Luis Gil", "Dermatology"),
        ])))
        .mount(&mock_server)
        .await;

    let listed = directory(&mock_server).await.list_all().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].id, second);
}

#[tokio::test]
async fn backend_failures_surface_as_directory_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/practitioners"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_json(MockSupabaseResponses::error_response("unavailable", "PGRST000")),
        )
        .mount(&mock_server)
        .await;

    let err = directory(&mock_server).await.list_all().await.unwrap_err();
    assert_matches!(err, DirectoryError::Backend(SupabaseError::Api { status: 503, .. }));
}

#[tokio::test]
async fn malformed_rows_are_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/practitioners"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "nope" }])))
        .mount(&mock_server)
        .await;

    let err = directory(&mock_server).await.list_all().await.unwrap_err();
    assert_matches!(err, DirectoryError::Malformed(_));
}
