//! Integration tests for HttpFetcher using wiremock

use std::time::Duration;

use reqwest::Client;
use timetable_mirror::error::AppError;
use timetable_mirror::utils::http::{DocumentFetcher, HttpFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(attempts: u32) -> HttpFetcher {
    HttpFetcher::with_client(
        Client::new(),
        attempts,
        Duration::from_millis(10),
        Duration::from_secs(2),
    )
}

/// Test successful fetch from mock server
#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plany/o1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Poniedziałek</p>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/plany/o1.html", mock_server.uri());
    let body = fetcher(3).fetch(&url).await.unwrap();
    assert!(body.contains("Poniedziałek"));
}

/// A 500 is retried and the next 200 wins
#[tokio::test]
async fn test_server_error_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/lista.html"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/lista.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/lista.html", mock_server.uri());
    let result = fetcher(3).fetch(&url).await;
    assert_eq!(result.unwrap(), "OK");
}

/// Gives up after the attempt budget with the last status
#[tokio::test]
async fn test_max_attempts_exceeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/always-fail"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let url = format!("{}/always-fail", mock_server.uri());
    let result = fetcher(3).fetch(&url).await;
    assert!(matches!(result, Err(AppError::Status { status: 503, .. })));
}

/// Slow responses hit the per-attempt timeout
#[tokio::test]
async fn test_timeout_is_a_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;

    let fetcher = HttpFetcher::with_client(
        Client::new(),
        1,
        Duration::from_millis(10),
        Duration::from_millis(50),
    );
    let url = format!("{}/slow", mock_server.uri());
    assert!(matches!(fetcher.fetch(&url).await, Err(AppError::Http(_))));
}
