mod fixture_server;

use fixture_server::{FixtureServer, Route};
use predicates::prelude::*;

const TITLE_PAGE: &str = r#"<!doctype html>
<html><body>
  <h3><a class="link link-hover" href="/title/7-en-test-manga">Test Manga</a></h3>
  <a href="/title/7-en-test-manga/20-ch-2">Ch.2</a>
  <a href="/title/7-en-test-manga/10-ch-1">Ch.1</a>
  <a href="/title/7-en-test-manga/10-ch-1">Ch.1</a>
</body></html>
"#;

#[test]
fn chapters_prints_sorted_catalog_json() -> anyhow::Result<()> {
    let server = FixtureServer::spawn(vec![("/title/7-en-test-manga", Route::html(TITLE_PAGE))]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mangascrape");
    let assert = cmd
        .args(["chapters", "--url", &server.url("/title/7-en-test-manga")])
        .assert()
        .success();

    let catalog: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    assert_eq!(catalog["manga"]["manga_id"], "7");
    assert_eq!(catalog["manga"]["manga_name"], "Test Manga");
    let chapters = catalog["chapters"].as_array().expect("chapters array");
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0]["chapter_number"], 1.0);
    assert_eq!(chapters[0]["url"], server.url("/title/7-en-test-manga/10-ch-1"));
    assert_eq!(chapters[1]["chapter_number"], 2.0);
    Ok(())
}

#[test]
fn chapters_rejects_non_title_url() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mangascrape");
    cmd.args(["chapters", "--url", "https://mangapark.net/search?q=solo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid url"));
}

#[test]
fn extract_with_generic_engine_prints_page_urls() {
    let page = r#"<div class="reader-page">
        <img data-src="/pages/002.jpg"><img data-src="/pages/001.jpg">
        <img src="/static/logo.png">
    </div>"#;
    let server = FixtureServer::spawn(vec![("/read/1", Route::html(page))]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mangascrape");
    cmd.args([
        "extract",
        "--engine",
        "generic",
        "--url",
        &server.url("/read/1"),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains(server.url("/pages/001.jpg")))
    .stdout(predicate::str::contains("\"total_pages\": 2"))
    .stdout(predicate::str::contains("logo").not());
}

#[test]
fn rust_log_debug_emits_debug_line_to_stderr() {
    let server = FixtureServer::spawn(vec![("/title/7-en-test-manga", Route::html(TITLE_PAGE))]);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mangascrape");
    cmd.env("RUST_LOG", "debug")
        .args(["chapters", "--url", &server.url("/title/7-en-test-manga")])
        .assert()
        .success()
        .stderr(predicate::str::contains("parsed cli"));
}

#[test]
fn missing_config_file_is_reported() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mangascrape");
    cmd.args([
        "--config",
        "/nonexistent/mangascrape.yaml",
        "chapters",
        "--url",
        "https://mangapark.net/title/1-en-x",
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("mangascrape.yaml"));
}
