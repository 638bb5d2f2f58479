//! End-to-end tests for docling-serve-client.
//!
//! Most tests drive the real `ReqwestTransport` against a local `wiremock`
//! server. The `live_*` tests talk to an actual docling-serve instance and
//! are gated behind `DOCLING_E2E_URL` so they do not run in CI unless
//! explicitly requested.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Against a live server:
//!   DOCLING_E2E_URL=http://localhost:5001 cargo test --test e2e live_ -- --nocapture

use docling_serve_client::{
    ClientConfig, ConvertDocumentsRequest, ConvertDocumentsRequestOptions, ConvertFileSettings,
    ConvertResult, DoclingClient, DoclingError, FileInput, HttpSource,
    HybridChunkerOptionsDocumentsRequest, OutputFormat, RequestOptions, ResponseFormat,
    TaskResult, TaskStatus,
};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_for(server: &MockServer) -> DoclingClient {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .api_key("test-key")
        .build()
        .expect("config");
    DoclingClient::new(config).expect("client")
}

/// Body of the only request the server received, as text.
async fn single_request_body(server: &MockServer) -> String {
    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1, "expected exactly one request");
    String::from_utf8_lossy(&requests[0].body).into_owned()
}

// ── Mock server ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header("x-api-key", "test-key"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let health = assert_ok!(client_for(&server).health(RequestOptions::new()).await);
    assert_eq!(health.expect("health body").status, "ok");
}

#[tokio::test]
async fn convert_source_round_trips_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/convert/source"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "document": {"filename": "2206.01062.pdf", "md_content": "# DocLayNet"},
            "status": "success",
            "errors": [],
            "processing_time": 3.2,
            "timings": {}
        })))
        .mount(&server)
        .await;

    let request = ConvertDocumentsRequest::new([HttpSource::new("https://arxiv.org/pdf/2206.01062")])
        .options(ConvertDocumentsRequestOptions {
            to_formats: Some(vec![OutputFormat::Md]),
            ..Default::default()
        });
    let result = assert_ok!(
        client_for(&server)
            .convert_source(&request, RequestOptions::new(), ResponseFormat::Json)
            .await
    );
    match result.structured() {
        Some(ConvertResult::Document(doc)) => {
            assert_eq!(doc.document.md_content.as_deref(), Some("# DocLayNet"))
        }
        other => panic!("unexpected {other:?}"),
    }

    let body: serde_json::Value =
        serde_json::from_str(&single_request_body(&server).await).unwrap();
    assert_eq!(body["sources"][0]["kind"], "http");
    assert_eq!(body["options"]["to_formats"], json!(["md"]));
}

#[tokio::test]
async fn convert_file_uploads_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/convert/file/async"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"task_id": "t-1", "task_status": "pending"})),
        )
        .mount(&server)
        .await;

    let settings = ConvertFileSettings {
        options: ConvertDocumentsRequestOptions {
            do_ocr: Some(false),
            ..Default::default()
        },
        target_type: None,
    };
    let files = vec![
        FileInput::new(b"%PDF-1.7 first".to_vec()).filename("report.pdf"),
        FileInput::new(b"second".to_vec()),
    ];
    let task = assert_ok!(
        client_for(&server)
            .convert_file_async(files, Some(&settings), RequestOptions::new())
            .await
    )
    .expect("task handle");
    assert_eq!(task.task_id, "t-1");

    let body = single_request_body(&server).await;
    assert!(body.contains(r#"name="files"; filename="report.pdf""#));
    assert!(body.contains(r#"name="files"; filename="file-2""#));
    assert!(body.contains("%PDF-1.7 first"));
    assert!(body.contains(r#"name="do_ocr""#));
}

#[tokio::test]
async fn file_read_from_disk_keeps_name_and_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chunk/hierarchical/file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"chunks": []})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("paper.pdf");
    std::fs::write(&pdf, b"%PDF-1.4").unwrap();
    let input = assert_ok!(FileInput::from_path(&pdf).await);

    assert_ok!(
        client_for(&server)
            .chunk_hierarchical_file(vec![input], None, RequestOptions::new(), ResponseFormat::Json)
            .await
    );

    let body = single_request_body(&server).await;
    assert!(body.contains(r#"filename="paper.pdf""#));
    assert!(body.contains("application/pdf"));
}

#[tokio::test]
async fn zip_response_is_returned_as_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/convert/source"))
        .and(header("accept", "application/zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/zip")
                .set_body_bytes(b"PK\x03\x04archive".to_vec()),
        )
        .mount(&server)
        .await;

    let request = ConvertDocumentsRequest::new([HttpSource::new("https://x/a.pdf")]);
    let payload = assert_ok!(
        client_for(&server)
            .convert_source(&request, RequestOptions::new(), ResponseFormat::Zip)
            .await
    );
    let bytes = payload.binary().expect("binary payload");
    assert!(bytes.starts_with(b"PK\x03\x04"));
}

#[tokio::test]
async fn validation_error_is_normalized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chunk/hybrid/source"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"loc": ["body", "sources", 0], "msg": "invalid url", "type": "value_error"}]
        })))
        .mount(&server)
        .await;

    let request = HybridChunkerOptionsDocumentsRequest::new([HttpSource::new("nope")]);
    let err = assert_err!(
        client_for(&server)
            .chunk_hybrid_source(&request, RequestOptions::new(), ResponseFormat::Json)
            .await
    );
    let api = err.as_api().expect("api error");
    assert_eq!(api.status().as_u16(), 422);
    assert_eq!(api.method(), "POST");
    assert_eq!(api.path(), "/v1/chunk/hybrid/source");
    assert_eq!(
        api.message(),
        "Request to /v1/chunk/hybrid/source failed with status 422"
    );
    let details = api.validation_errors();
    assert_eq!(details[0].msg, "invalid url");
    assert_eq!(details[0].kind, "value_error");
}

#[tokio::test]
async fn server_error_with_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/clear/results"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("content-type", "text/plain")
                .set_body_string("maintenance"),
        )
        .mount(&server)
        .await;

    let err = assert_err!(client_for(&server).clear_results(RequestOptions::new()).await);
    let api = err.as_api().expect("api error");
    assert!(api.is_server_error());
    assert_eq!(api.body(), Some(&json!("maintenance")));
}

#[tokio::test]
async fn no_content_clear_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/clear/converters"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let cleared = assert_ok!(client_for(&server).clear_converters(RequestOptions::new()).await);
    assert!(cleared.is_none());
}

#[tokio::test]
async fn async_task_flow_against_mock() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chunk/hybrid/source/async"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"task_id": "job/42", "task_status": "pending"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/status/poll/job%2F42"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"task_id": "job/42", "task_status": "success"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/result/job%2F42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chunks": [{"filename": "a.pdf", "chunk_index": 0, "text": "Intro"}],
            "documents": [],
            "processing_time": 0.7
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let request = HybridChunkerOptionsDocumentsRequest::new([HttpSource::new("https://x/a.pdf")]);
    let task = assert_ok!(
        client
            .chunk_hybrid_source_async(&request, RequestOptions::new())
            .await
    )
    .expect("task handle");
    let status = assert_ok!(client.poll_task(&task.task_id, RequestOptions::new()).await)
        .expect("task status");
    assert_eq!(status.task_status, TaskStatus::Success);

    let result = assert_ok!(
        client
            .task_result(&task.task_id, RequestOptions::new(), ResponseFormat::Json)
            .await
    );
    match result.structured() {
        Some(TaskResult::Chunk(chunks)) => assert_eq!(chunks.chunks[0].text, "Intro"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_aborts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok"}))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = assert_err!(
        client_for(&server)
            .health(RequestOptions::new().cancel(token))
            .await
    );
    assert!(err.is_cancelled(), "expected cancellation, got {err:?}");
}

#[tokio::test]
async fn cancellation_interrupts_stalled_download() {
    init_tracing();
    // Headers and two bytes of a 1000-byte archive, then silence.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/zip\r\ncontent-length: 1000\r\n\r\nPK",
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(socket);
    });

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let client = DoclingClient::with_base_url(format!("http://{addr}")).unwrap();
    let request = ConvertDocumentsRequest::new([HttpSource::new("https://x/a.pdf")]);
    let started = Instant::now();
    let err = assert_err!(
        client
            .convert_source(&request, RequestOptions::new().cancel(token), ResponseFormat::Zip)
            .await
    );
    assert!(err.is_cancelled(), "expected cancellation, got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    init_tracing();
    // Port 9 (discard) is essentially never served on loopback.
    let client = DoclingClient::with_base_url("http://127.0.0.1:9").unwrap();
    let err = assert_err!(client.health(RequestOptions::new()).await);
    assert!(matches!(err, DoclingError::Transport(_)), "got {err:?}");
}

// ── Live server ──────────────────────────────────────────────────────────────

/// Skip this test unless DOCLING_E2E_URL points at a running server.
macro_rules! live_client_or_skip {
    () => {{
        match std::env::var("DOCLING_E2E_URL") {
            Ok(url) if !url.trim().is_empty() => {
                init_tracing();
                DoclingClient::with_base_url(url).expect("client")
            }
            _ => {
                println!("SKIP — set DOCLING_E2E_URL to run live tests");
                return;
            }
        }
    }};
}

#[tokio::test]
async fn live_health() {
    let client = live_client_or_skip!();
    let health = assert_ok!(client.health(RequestOptions::new()).await).expect("health body");
    println!("health: {health:?}");
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn live_convert_arxiv_async() {
    let client = live_client_or_skip!();
    let request = ConvertDocumentsRequest::new([HttpSource::new("https://arxiv.org/pdf/2206.01062")])
        .options(ConvertDocumentsRequestOptions {
            to_formats: Some(vec![OutputFormat::Md]),
            page_range: Some((1, 1)),
            ..Default::default()
        });

    let task = assert_ok!(client.convert_source_async(&request, RequestOptions::new()).await)
        .expect("task handle");
    let mut status = task.task_status;
    for _ in 0..120 {
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        status = assert_ok!(client.poll_task(&task.task_id, RequestOptions::new()).await)
            .expect("task status")
            .task_status;
    }
    assert_eq!(status, TaskStatus::Success);

    let result = assert_ok!(
        client
            .task_result(&task.task_id, RequestOptions::new(), ResponseFormat::Json)
            .await
    );
    match result.structured() {
        Some(TaskResult::Convert(ConvertResult::Document(doc))) => {
            let md = doc.document.md_content.unwrap_or_default();
            println!("{} chars of markdown", md.len());
            assert!(!md.trim().is_empty());
        }
        other => panic!("unexpected {other:?}"),
    }
}
