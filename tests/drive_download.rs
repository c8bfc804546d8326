use mockito::{Matcher, Server};
use std::sync::Arc;
use std::time::Duration;
use studyshare_bot::files::drive::{DriveDownloader, DriveError, DriveLister, GoogleDriveApi};
use studyshare_bot::files::{DriveProvider, FileLocation, FileSize};
use studyshare_bot::http::{create_download_client, create_http_client};

const SCAN_WARNING_PAGE: &str = r#"<!DOCTYPE html><html><body>
<p>Google Drive can't scan this file for viruses.</p>
<form action="/uc?export=download&amp;id=abc&amp;confirm=t0k3n_X" method="post"></form>
</body></html>"#;

fn downloader() -> DriveDownloader {
    DriveDownloader::new(create_download_client().expect("download client"))
}

#[tokio::test]
async fn virus_scan_page_is_confirmed_and_retried() {
    let mut server = Server::new_async().await;
    let warning = server
        .mock("GET", "/uc")
        .match_query(Matcher::Regex("^id=abc$".to_string()))
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(SCAN_WARNING_PAGE)
        .create_async()
        .await;
    let file = server
        .mock("GET", "/uc")
        .match_query(Matcher::UrlEncoded("confirm".into(), "t0k3n_X".into()))
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(vec![7u8; 2048])
        .create_async()
        .await;

    let downloader = downloader();
    let url = format!("{}/uc?id=abc", server.url());
    let downloaded = downloader
        .download_url(&url, "CS101 handout.pdf")
        .await
        .expect("download");

    assert_eq!(downloaded.bytes.len(), 2048);
    assert_eq!(downloaded.name, "CS101 handout.pdf");
    assert_eq!(downloaded.mime_type, "application/pdf");
    warning.assert_async().await;
    file.assert_async().await;
}

#[tokio::test]
async fn relative_redirects_are_followed() {
    let mut server = Server::new_async().await;
    let _start = server
        .mock("GET", "/start")
        .with_status(302)
        .with_header("location", "/content/file.bin")
        .create_async()
        .await;
    let _file = server
        .mock("GET", "/content/file.bin")
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body("hello")
        .create_async()
        .await;

    let downloader = downloader();
    let downloaded = downloader
        .download_url(&format!("{}/start", server.url()), "notes.txt")
        .await
        .expect("download");
    assert_eq!(downloaded.bytes, b"hello");
    assert_eq!(downloaded.mime_type, "text/plain");
}

#[tokio::test]
async fn html_without_token_is_an_error() {
    let mut server = Server::new_async().await;
    let _page = server
        .mock("GET", "/uc")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body>Sign in</body></html>")
        .create_async()
        .await;

    let downloader = downloader();
    let err = downloader
        .download_url(&format!("{}/uc?id=private", server.url()), "x.pdf")
        .await
        .expect_err("html page");
    assert!(matches!(err, DriveError::HtmlInsteadOfFile));
}

#[tokio::test]
async fn error_status_and_redirect_loops_fail() {
    let mut server = Server::new_async().await;
    let _missing = server
        .mock("GET", "/gone")
        .with_status(404)
        .create_async()
        .await;
    let _loop = server
        .mock("GET", "/loop")
        .with_status(302)
        .with_header("location", "/loop")
        .create_async()
        .await;

    let downloader = downloader();
    let err = downloader
        .download_url(&format!("{}/gone", server.url()), "a.pdf")
        .await
        .expect_err("404");
    assert!(matches!(err, DriveError::HttpStatus(404)));

    let err = downloader
        .download_url(&format!("{}/loop", server.url()), "a.pdf")
        .await
        .expect_err("loop");
    assert!(matches!(err, DriveError::TooManyRedirects));
}

#[tokio::test]
async fn listing_api_pages_are_parsed() {
    let mut server = Server::new_async().await;
    let _page = server
        .mock("GET", "/files")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "'root123' in parents".into()),
            Matcher::UrlEncoded("key".into(), "test-key".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"files":[
                {"id":"f1","name":"CS101 Handout.pdf","mimeType":"application/pdf","size":"1234"},
                {"id":"d1","name":"Quizzes","mimeType":"application/vnd.google-apps.folder"}
            ]}"#,
        )
        .create_async()
        .await;

    let api = GoogleDriveApi::with_base_url(create_http_client(), "test-key".into(), server.url());
    let page = api.list_children("root123", None).await.expect("page");
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].size_bytes(), Some(1234));
    assert!(page.items[1].is_folder());
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn listing_api_error_is_reported() {
    let mut server = Server::new_async().await;
    let _denied = server
        .mock("GET", "/files")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"Drive API has not been used","status":"PERMISSION_DENIED"}}"#)
        .create_async()
        .await;

    let api = GoogleDriveApi::with_base_url(create_http_client(), "k".into(), server.url());
    let err = api.list_children("root", None).await.expect_err("403");
    let DriveError::Api(message) = err else {
        panic!("unexpected error: {err}");
    };
    assert!(message.contains("PERMISSION_DENIED"));
}

#[tokio::test]
async fn provider_searches_the_listing() {
    let mut server = Server::new_async().await;
    let _root = server
        .mock("GET", "/files")
        .match_query(Matcher::UrlEncoded("q".into(), "'root' in parents".into()))
        .with_status(200)
        .with_body(
            r#"{"files":[
                {"id":"a","name":"CS999 handout.pdf","mimeType":"application/pdf","size":"10"},
                {"id":"b","name":"MTH101 quiz.pdf","mimeType":"application/pdf"}
            ]}"#,
        )
        .create_async()
        .await;

    let api = GoogleDriveApi::with_base_url(create_http_client(), "k".into(), server.url());
    let provider = DriveProvider::new(
        Arc::new(api),
        downloader(),
        vec!["root".to_string()],
        Duration::from_secs(60),
    )
    .with_delays(Duration::ZERO, Duration::ZERO);

    let hits = provider.search_by_subject_code("cs999").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].size, FileSize::Known(10));
    assert!(matches!(hits[0].location, FileLocation::Remote { ref id, .. } if id == "a"));
    assert_eq!(provider.cached_file_count().await, 2);
}
