//! Integration tests for the harvester
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! pipeline end-to-end against a temporary output directory.

use docsweep::config::Config;
use docsweep::crawler::Coordinator;
use docsweep::{RunSummary, StorageKey, SweepError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEADER: &str = "original_url,local_path,file_urls";

/// Creates a test configuration pointing at the mock server
fn create_test_config(start_url: &str, output: &Path) -> Config {
    let mut config = Config::new(
        vec![start_url.to_string()],
        output.to_string_lossy().into_owned(),
    );
    config.crawler.download_delay_ms = 0;
    config.crawler.max_retries = 0;
    config.crawler.retry_backoff_ms = 10;
    config.user_agent.crawler_name = "TestBot".to_string();
    config
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html; charset=utf-8",
    )
}

fn pdf(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(content.as_bytes().to_vec(), "application/pdf")
}

async fn mount_pdf(server: &MockServer, route: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(pdf(&format!("%PDF-1.7 {}", route)))
        .expect(expected)
        .mount(server)
        .await;
}

/// Mounts a two-page listing: page 1 has two documents and a next link,
/// page 2 has one document and no next link
async fn mount_two_page_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/decisions"))
        .respond_with(html(
            r#"<a href="decision1.pdf">One</a>
               <a href="/files/decision2.PDF">Two</a>
               <a rel="next" href="/decisions/page/2">Next</a>"#
                .to_string(),
        ))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/decisions/page/2"))
        .respond_with(html(r#"<a href="/files/decision3.pdf">Three</a>"#.to_string()))
        .expect(1)
        .mount(server)
        .await;
}

async fn run(config: Config) -> RunSummary {
    Coordinator::new(config)
        .expect("Failed to create coordinator")
        .run()
        .await
        .expect("Run failed")
}

fn metadata_rows(output: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(output.join("metadata.csv")).unwrap();
    reader.records().map(Result::unwrap).collect()
}

fn header_count(output: &Path) -> usize {
    std::fs::read_to_string(output.join("metadata.csv"))
        .unwrap()
        .lines()
        .filter(|line| *line == HEADER)
        .count()
}

#[tokio::test]
async fn test_two_page_listing_end_to_end() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    mount_two_page_listing(&server).await;
    mount_pdf(&server, "/decision1.pdf", 1).await;
    mount_pdf(&server, "/files/decision2.PDF", 1).await;
    mount_pdf(&server, "/files/decision3.pdf", 1).await;

    let start = format!("{}/decisions", server.uri());
    let summary = run(create_test_config(&start, out.path())).await;

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.documents_found, 3);
    assert_eq!(summary.documents_attempted, 3);
    assert_eq!(summary.documents_downloaded, 3);
    assert_eq!(summary.rows_written, 3);

    let rows = metadata_rows(out.path());
    assert_eq!(rows.len(), 3);
    assert_eq!(header_count(out.path()), 1);

    let doc_url = Url::parse(&format!("{}/files/decision2.PDF", server.uri())).unwrap();
    let key = StorageKey::from_url(&doc_url);
    let row = rows
        .iter()
        .find(|row| &row[2] == doc_url.as_str())
        .expect("row for decision2");
    assert_eq!(&row[0], start.as_str());

    let stored = Path::new(&row[1]);
    assert!(stored.is_absolute());
    assert!(stored.ends_with(Path::new("pdfs").join(key.as_str())));
    assert_eq!(
        std::fs::read(stored).unwrap(),
        b"%PDF-1.7 /files/decision2.PDF".to_vec()
    );
}

#[tokio::test]
async fn test_failed_document_writes_no_row() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    mount_two_page_listing(&server).await;
    mount_pdf(&server, "/decision1.pdf", 1).await;
    mount_pdf(&server, "/files/decision3.pdf", 1).await;
    Mock::given(method("GET"))
        .and(path("/files/decision2.PDF"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = create_test_config(&format!("{}/decisions", server.uri()), out.path());
    config.crawler.max_retries = 1;
    let summary = run(config).await;

    assert_eq!(summary.documents_attempted, 3);
    assert_eq!(summary.documents_succeeded(), 2);
    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(metadata_rows(out.path()).len(), 2);
}

#[tokio::test]
async fn test_rerun_reuses_stored_documents() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    // Listing pages are fetched on both runs; documents only on the first
    Mock::given(method("GET"))
        .and(path("/decisions"))
        .respond_with(html(
            r#"<a href="a.pdf">A</a><a href="b.pdf">B</a>"#.to_string(),
        ))
        .expect(2)
        .mount(&server)
        .await;
    mount_pdf(&server, "/a.pdf", 1).await;
    mount_pdf(&server, "/b.pdf", 1).await;

    let start = format!("{}/decisions", server.uri());
    let first = run(create_test_config(&start, out.path())).await;
    let first_rows = metadata_rows(out.path());

    let second = run(create_test_config(&start, out.path())).await;
    let all_rows = metadata_rows(out.path());

    assert_eq!(first.documents_downloaded, 2);
    assert_eq!(second.documents_downloaded, 0);
    assert_eq!(second.documents_reused, 2);
    assert_eq!(header_count(out.path()), 1);

    // Reruns append rows again, pointing at the same stored paths
    assert_eq!(all_rows.len(), 4);
    let mut first_paths: Vec<&str> = first_rows.iter().map(|r| &r[1]).collect();
    let mut second_paths: Vec<&str> = all_rows[2..].iter().map(|r| &r[1]).collect();
    first_paths.sort();
    second_paths.sort();
    assert_eq!(first_paths, second_paths);
}

#[tokio::test]
async fn test_next_link_cycle_fetches_each_page_once() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/p1"))
        .respond_with(html(r#"<a aria-label="Next page" href="/p2">→</a>"#.to_string()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p2"))
        .respond_with(html(r#"<a href="/p1#top">&gt;</a>"#.to_string()))
        .expect(1)
        .mount(&server)
        .await;

    let summary = run(create_test_config(&format!("{}/p1", server.uri()), out.path())).await;

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.documents_found, 0);
}

#[tokio::test]
async fn test_next_link_to_redirect_target_is_a_cycle() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/list", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(
            r#"<a href="/a.pdf">A</a><a rel="next" href="/list/2">Next</a>"#.to_string(),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list/2"))
        .respond_with(html(r#"<a rel="next" href="/list">Next</a>"#.to_string()))
        .expect(1)
        .mount(&server)
        .await;
    mount_pdf(&server, "/a.pdf", 1).await;

    let summary = run(create_test_config(&format!("{}/start", server.uri()), out.path())).await;

    assert_eq!(summary.pages_visited, 2);
    assert_eq!(summary.documents_found, 1);
    assert_eq!(summary.rows_written, 1);

    let rows = metadata_rows(out.path());
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], format!("{}/list", server.uri()).as_str());
}

#[tokio::test]
async fn test_page_cap_stops_pagination() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/decisions"))
        .respond_with(html(
            r#"<a href="a.pdf">A</a><a rel="next" href="/decisions/page/2">Next</a>"#.to_string(),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/decisions/page/2"))
        .respond_with(html(String::new()))
        .expect(0)
        .mount(&server)
        .await;
    mount_pdf(&server, "/a.pdf", 1).await;

    let mut config = create_test_config(&format!("{}/decisions", server.uri()), out.path());
    config.crawler.max_pages = Some(1);
    let summary = run(config).await;

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.rows_written, 1);
}

#[tokio::test]
async fn test_offsite_next_page_is_refused() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/decisions"))
        .respond_with(html(format!(
            r#"<a href="a.pdf">A</a><a rel="next" href="{}/decisions/page/2">Next</a>"#,
            server.uri().replace("127.0.0.1", "localhost")
        )))
        .expect(1)
        .mount(&server)
        .await;
    mount_pdf(&server, "/a.pdf", 1).await;

    let mut config = create_test_config(&format!("{}/decisions", server.uri()), out.path());
    config.crawler.allowed_domains = vec!["127.0.0.1".to_string()];
    let summary = run(config).await;

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.rows_written, 1);
}

#[tokio::test]
async fn test_robots_disallowed_document_fails() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/\n"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/decisions"))
        .respond_with(html(
            r#"<a href="/private/secret.pdf">S</a><a href="/public.pdf">P</a>"#.to_string(),
        ))
        .mount(&server)
        .await;
    mount_pdf(&server, "/private/secret.pdf", 0).await;
    mount_pdf(&server, "/public.pdf", 1).await;

    let summary = run(create_test_config(&format!("{}/decisions", server.uri()), out.path())).await;

    assert_eq!(summary.documents_attempted, 2);
    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.rows_written, 1);
}

#[tokio::test]
async fn test_non_html_start_page_yields_nothing() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"next": "/feed?page=2"}"#, "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let summary = run(create_test_config(&format!("{}/feed", server.uri()), out.path())).await;

    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.documents_found, 0);
    assert_eq!(header_count(out.path()), 1);
    assert!(metadata_rows(out.path()).is_empty());
}

#[tokio::test]
async fn test_missing_start_page_is_not_fatal() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();

    let summary = run(create_test_config(&format!("{}/gone", server.uri()), out.path())).await;

    assert_eq!(summary.pages_visited, 0);
    assert_eq!(summary.pages_failed, 1);
}

#[tokio::test]
async fn test_unwritable_metadata_table_aborts_before_fetching() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    std::fs::create_dir_all(out.path().join("metadata.csv")).unwrap();

    Mock::given(method("GET"))
        .respond_with(html(String::new()))
        .expect(0)
        .mount(&server)
        .await;

    let coordinator = Coordinator::new(create_test_config(
        &format!("{}/decisions", server.uri()),
        out.path(),
    ))
    .unwrap();
    let result = coordinator.run().await;

    assert!(matches!(result, Err(SweepError::Sink(_))));
}

#[test]
fn test_empty_start_urls_rejected_before_any_fetch() {
    let out = TempDir::new().unwrap();
    let mut config = create_test_config("https://example.org/", out.path());
    config.start_urls.clear();

    let result = Coordinator::new(config);
    assert!(matches!(result, Err(SweepError::Config(_))));
}

/// Serves one listing page linking `documents` PDFs and records the peak
/// number of requests handled at the same time
async fn start_counting_server(documents: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let listing: String = (0..documents)
        .map(|i| format!(r#"<a href="/doc{}.pdf">{}</a>"#, i, i))
        .collect();

    let server_peak = peak.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let in_flight = in_flight.clone();
            let peak = server_peak.clone();
            let listing = listing.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request);
                let route = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);

                let (status, content_type, body) = if route == "/list" {
                    ("200 OK", "text/html", listing.into_bytes())
                } else if route.ends_with(".pdf") {
                    ("200 OK", "application/pdf", b"%PDF-1.7".to_vec())
                } else {
                    ("404 Not Found", "text/plain", b"missing".to_vec())
                };
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    content_type,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), peak)
}

#[tokio::test]
async fn test_many_links_stay_within_global_request_bound() {
    let (base, peak) = start_counting_server(50).await;
    let out = TempDir::new().unwrap();

    let mut config = create_test_config(&format!("{}/list", base), out.path());
    config.crawler.max_concurrent_requests = 4;
    config.crawler.max_requests_per_host = 4;
    let summary = run(config).await;

    assert_eq!(summary.documents_attempted, 50);
    assert_eq!(summary.documents_downloaded, 50);
    assert_eq!(summary.rows_written, 50);
    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert!(peak.load(Ordering::SeqCst) >= 1);
}
