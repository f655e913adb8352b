use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::{PatientDirectory, SupabasePatientDirectory};
use shared_database::{DirectoryError, SupabaseError};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn directory(mock_server: &MockServer) -> SupabasePatientDirectory {
    SupabasePatientDirectory::new(&TestConfig::with_supabase(&mock_server.uri()).to_app_config())
}

#[tokio::test]
async fn finds_patient_by_id() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(id, "Marta Soler")
        ])))
        .mount(&mock_server)
        .await;

    let patient = directory(&mock_server).find_by_id(id).await.unwrap().unwrap();
    assert_eq!(patient.name, "Marta Soler");
    assert_eq!(patient.role, "patient");
}

#[tokio::test]
async fn unknown_patient_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    assert!(directory(&mock_server).find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn unauthorized_backend_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .mount(&mock_server)
        .await;

    let err = directory(&mock_server).find_by_id(Uuid::new_v4()).await.unwrap_err();
    assert_matches!(err, DirectoryError::Backend(SupabaseError::Auth(_)));
}
