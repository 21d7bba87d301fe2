//! Deposition and record callers against a mock Zenodo

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zenodo_core::{
    ClientConfig, CreateFilesOptions, FileBlob, LogLevel, MemoryLogger, Metadata, Record,
    RetryPolicy, UploadStatus, UploadType, Zenodo, ZenodoFile,
};

async fn setup() -> (MockServer, Zenodo, Arc<MemoryLogger>) {
    let server = MockServer::start().await;
    let logger = Arc::new(MemoryLogger::new());
    let zenodo = Zenodo::builder(
        ClientConfig::new("test-token").with_base_url(format!("{}/api/", server.uri())),
    )
    .retry_policy(RetryPolicy::no_retry())
    .logger(logger.clone())
    .build()
    .expect("client");
    (server, zenodo, logger)
}

async fn draft_record(server: &MockServer, zenodo: &Zenodo) -> Record {
    Mock::given(method("GET"))
        .and(path("/api/records/abc/draft"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc", "title": "Draft"})))
        .mount(server)
        .await;
    zenodo.retrieve_record("abc").await.expect("record")
}

#[tokio::test]
async fn test_create_deposition_sends_metadata_envelope() {
    let (server, zenodo, logger) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions"))
        .and(body_json(json!({"metadata": {"upload_type": "dataset", "title": "Measurements"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 12,
            "title": "Measurements",
            "state": "unsubmitted",
            "links": {"bucket": "https://example.org/bucket"},
            "unknown_field": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = Metadata::new(UploadType::Dataset, "Measurements");
    let deposition = zenodo.create_deposition(&metadata).await.expect("deposition");

    assert_eq!(deposition.id(), 12);
    assert_eq!(deposition.value.extra["unknown_field"], json!(true));
    assert!(logger.contains(LogLevel::Info, "Created deposition 12"));
}

#[tokio::test]
async fn test_malformed_deposition_is_a_schema_error() {
    let (server, zenodo, _) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/deposit/depositions/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "no id"})))
        .mount(&server)
        .await;

    let err = zenodo.retrieve_deposition(3).await.unwrap_err();
    assert!(matches!(err, zenodo_core::Error::SchemaValidation { .. }));
}

#[tokio::test]
async fn test_list_and_delete_depositions() {
    let (server, zenodo, logger) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/deposit/depositions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/deposit/depositions/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let options = zenodo_core::ListOptions::default().size(2);
    let depositions = zenodo.list_depositions(&options).await.unwrap();
    assert_eq!(depositions.len(), 2);
    zenodo.delete_deposition(2).await.unwrap();

    assert!(logger.contains(LogLevel::Info, "Listed 2 depositions"));
    assert!(logger.contains(LogLevel::Info, "Deleted deposition 2"));
}

#[tokio::test]
async fn test_create_files_retries_only_rejected_uploads() {
    let (server, zenodo, logger) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/deposit/depositions/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions/1/files"))
        .and(body_string_contains("b.txt"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "try later"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions/1/files"))
        .and(body_string_contains("b.txt"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "f-b", "filename": "b.txt"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions/1/files"))
        .and(body_string_contains("a.txt"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "f-a", "filename": "a.txt"})))
        .expect(1)
        .mount(&server)
        .await;

    let deposition = zenodo.retrieve_deposition(1).await.unwrap();
    let files = vec![
        FileBlob::new("a.txt", "first").with_mime_type("text/plain"),
        FileBlob::new("b.txt", "second"),
    ];
    let options = CreateFilesOptions::with_delays([Duration::ZERO, Duration::from_millis(10)]);
    let statuses = deposition.create_files(&files, &options).await.unwrap();

    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(UploadStatus::is_fulfilled));
    assert_eq!(statuses[0].filename(), "a.txt");
    assert_eq!(statuses[1].filename(), "b.txt");
    assert!(logger.contains(LogLevel::Info, "Successfully uploaded all files for deposition 1"));
}

#[tokio::test]
async fn test_create_files_reports_persistent_failures() {
    let (server, zenodo, logger) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/deposit/depositions/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions/1/files"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "quota"})))
        .expect(2)
        .mount(&server)
        .await;

    let deposition = zenodo.retrieve_deposition(1).await.unwrap();
    let files = vec![FileBlob::new("big.bin", vec![0u8; 16])];
    let options = CreateFilesOptions::with_delays([Duration::ZERO, Duration::from_millis(10)]);
    let statuses = deposition.create_files(&files, &options).await.unwrap();

    match &statuses[0] {
        UploadStatus::Rejected { filename, error } => {
            assert_eq!(filename, "big.bin");
            assert!(error.ends_with(": quota"));
        }
        other => panic!("expected a rejection, got {:?}", other),
    }
    assert!(logger.contains(LogLevel::Warn, "Failed to upload 1 files after 2 attempts: big.bin"));
}

#[tokio::test]
async fn test_create_file_is_multipart() {
    let (server, zenodo, _) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/deposit/depositions/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions/1/files"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "f1", "filename": "a.txt"})))
        .mount(&server)
        .await;

    let deposition = zenodo.retrieve_deposition(1).await.unwrap();
    let file = deposition
        .create_file(&FileBlob::new("a.txt", "hello"))
        .await
        .unwrap();
    assert_eq!(file.id.as_deref(), Some("f1"));

    let requests = server.received_requests().await.unwrap();
    let upload = requests.last().unwrap();
    let content_type = upload.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&upload.body);
    assert!(body.contains(r#"name="file"; filename="a.txt""#));
    assert!(body.contains("hello"));
}

#[tokio::test]
async fn test_new_version_fills_publication_date() {
    let (server, zenodo, logger) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/deposit/depositions/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/deposit/depositions/1/actions/newversion"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": 2, "metadata": {"title": "Next"}})),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/deposit/depositions/2"))
        .and(body_string_contains("publication_date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "metadata": {"title": "Next", "publication_date": "2026-01-01"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let deposition = zenodo.retrieve_deposition(1).await.unwrap();
    let next = deposition.new_version().await.unwrap();

    assert_eq!(next.id(), 2);
    assert!(next.value.metadata.unwrap().publication_date.is_some());
    assert!(logger.contains(LogLevel::Info, "Updated deposition 2"));
    assert!(logger.contains(LogLevel::Info, "Created new version for deposition 1"));
}

#[tokio::test]
async fn test_record_upload_registers_uploads_and_commits() {
    let (server, zenodo, logger) = setup().await;
    let record = draft_record(&server, &zenodo).await;

    Mock::given(method("POST"))
        .and(path("/api/records/abc/draft/files"))
        .and(body_json(json!([{"key": "a.txt"}, {"key": "b.txt"}])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"entries": []})))
        .expect(1)
        .mount(&server)
        .await;
    for name in ["a.txt", "b.txt"] {
        Mock::given(method("PUT"))
            .and(path(format!("/api/records/abc/draft/files/{}/content", name)))
            .and(header("content-type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/api/records/abc/draft/files/{}/commit", name)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"key": name, "status": "completed"})),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let files = vec![FileBlob::new("a.txt", "first"), FileBlob::new("b.txt", "second")];
    let committed = record.upload_files(&files).await.unwrap();

    let names: Vec<_> = committed.iter().filter_map(ZenodoFile::name).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert!(logger.contains(LogLevel::Info, "Uploaded 2 files for record abc"));
}

#[tokio::test]
async fn test_record_list_files_warns_about_more_pages() {
    let (server, zenodo, logger) = setup().await;
    let record = draft_record(&server, &zenodo).await;
    Mock::given(method("GET"))
        .and(path("/api/records/abc/draft/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{"key": "a.txt", "size": 5}],
            "links": {"self": "x", "next": "y"}
        })))
        .mount(&server)
        .await;

    let files = record.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert!(logger.contains(LogLevel::Warn, "Multiple pages of files found for record abc"));
}

#[tokio::test]
async fn test_record_delete_all_files() {
    let (server, zenodo, logger) = setup().await;
    let record = draft_record(&server, &zenodo).await;
    Mock::given(method("GET"))
        .and(path("/api/records/abc/draft/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [{"key": "a.txt"}, {"key": "b.txt"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/records/abc/draft/files/a.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/records/abc/draft/files/b.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    record.delete_all_files().await.unwrap();
    assert!(logger.contains(LogLevel::Info, "Deleted all files for record abc"));
}

#[tokio::test]
async fn test_submit_for_review_finds_matching_request() {
    let (server, zenodo, logger) = setup().await;
    let record = draft_record(&server, &zenodo).await;
    let submit = format!("{}/api/requests/r-1/actions/submit", server.uri());
    Mock::given(method("GET"))
        .and(path("/api/requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": {"total": 2, "hits": [
            {"id": "r-0", "topic": {"record": "other"}},
            {"id": "r-1", "topic": {"record": "abc"}, "links": {"actions": {"submit": submit}}}
        ]}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/requests/r-1/actions/submit"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let review = record.submit_for_review(None).await.unwrap();
    assert_eq!(review.id, Some("r-1".into()));
    assert!(logger.contains(LogLevel::Info, "Submitted deposition abc for review"));
}

#[tokio::test]
async fn test_submit_for_review_via_url() {
    let (server, zenodo, logger) = setup().await;
    let record = draft_record(&server, &zenodo).await;
    Mock::given(method("POST"))
        .and(path("/api/requests/r-9/actions/submit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "r-9", "status": "submitted"})))
        .expect(1)
        .mount(&server)
        .await;

    let review = record
        .submit_for_review(Some("https://zenodo.org/api/requests/r-9/actions/submit"))
        .await
        .unwrap();
    assert_eq!(review.status.as_deref(), Some("submitted"));
    assert!(logger.contains(
        LogLevel::Info,
        "Submitted deposition abc for review via URL requests/r-9/actions/submit"
    ));
}

#[tokio::test]
async fn test_add_to_community_and_reserve_doi() {
    let (server, zenodo, logger) = setup().await;
    let record = draft_record(&server, &zenodo).await;
    Mock::given(method("PUT"))
        .and(path("/api/records/abc/draft/review"))
        .and(body_json(json!({"receiver": {"community": "c-1"}, "type": "community-submission"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "req"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/records/abc/draft/pids/doi"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "abc", "doi": "10.5072/zenodo.1"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = record.add_to_community("c-1").await.unwrap();
    assert_eq!(response["id"], "req");
    let reserved = record.reserve_doi().await.unwrap();
    assert_eq!(reserved.value.doi.as_deref(), Some("10.5072/zenodo.1"));
    assert!(logger.contains(LogLevel::Info, "Added deposition abc to community c-1"));
    assert!(logger.contains(LogLevel::Info, "Reserved DOI for record abc"));
}

#[tokio::test]
async fn test_download_file_follows_absolute_link() {
    let (server, zenodo, _) = setup().await;
    Mock::given(method("GET"))
        .and(path("/files/bucket/a.txt"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"payload".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = ZenodoFile::default();
    file.key = Some("a.txt".to_string());
    file.links.insert(
        "content".to_string(),
        format!("{}/files/bucket/a.txt", server.uri()),
    );
    let data = zenodo.download_file(&file).await.unwrap();
    assert_eq!(data, b"payload");
}
