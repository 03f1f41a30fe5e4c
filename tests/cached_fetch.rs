//! At-most-once fetch semantics and cache-pollution guarantees.

use lexkv::fetch::{Downloader, cached_fetch};
use lexkv::{Kind, KvError, LocalKv};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Download primitive stub that counts calls and serves a fixed payload.
struct CountingDownloader {
    payload: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingDownloader {
    fn new(payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Downloader for CountingDownloader {
    fn download(&self, _url: &str) -> Result<Vec<u8>, KvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

struct FailingDownloader {
    calls: AtomicUsize,
}

impl Downloader for FailingDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, KvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(KvError::Fetch(format!("{url}: HTTP status 503")))
    }
}

#[test]
fn second_fetch_of_a_url_is_served_from_the_store() {
    let mut store = LocalKv::open_in_memory(Kind::Text, Kind::Bytes).expect("open");
    let stub = CountingDownloader::new(b"hello");

    let (first, from_cache) =
        cached_fetch(&mut store, &stub, "http://x", false).expect("first fetch");
    assert_eq!(first, b"hello");
    assert!(!from_cache);

    let (second, from_cache) =
        cached_fetch(&mut store, &stub, "http://x", false).expect("second fetch");
    assert_eq!(second, b"hello");
    assert!(from_cache, "second call must be a cache hit");
    assert_eq!(stub.calls(), 1, "exactly one network download");
}

#[test]
fn cache_hits_survive_a_process_restart() {
    let tmp = TempDir::new().expect("tempdir");
    let path = tmp.path().join("pages.db");
    let name = path.to_str().expect("utf8 path");
    let url = "https://zoek.example.nl/sru?startRecord=1";

    let stub = CountingDownloader::new(b"<searchRetrieveResponse/>");
    {
        let mut store = LocalKv::open(name, Kind::Text, Kind::Bytes).expect("open");
        cached_fetch(&mut store, &stub, url, false).expect("first fetch");
    }

    let mut store = LocalKv::open(name, Kind::Text, Kind::Bytes).expect("reopen");
    let (body, from_cache) = cached_fetch(&mut store, &stub, url, false).expect("after reopen");
    assert_eq!(body, b"<searchRetrieveResponse/>");
    assert!(from_cache, "committed entry must survive reopen");
    assert_eq!(stub.calls(), 1);
}

#[test]
fn failed_download_is_never_written_to_the_store() {
    let mut store = LocalKv::open_in_memory(Kind::Text, Kind::Bytes).expect("open");
    let failing = FailingDownloader {
        calls: AtomicUsize::new(0),
    };

    let err = cached_fetch(&mut store, &failing, "http://x", false).expect_err("must propagate");
    assert!(matches!(err, KvError::Fetch(_)), "{err}");
    assert!(
        !store.contains("http://x").expect("contains"),
        "a failed fetch must not pollute the cache"
    );

    // The URL stays retryable: a later successful fetch populates the cache.
    let stub = CountingDownloader::new(b"recovered");
    let (body, from_cache) = cached_fetch(&mut store, &stub, "http://x", false).expect("retry");
    assert_eq!(body, b"recovered");
    assert!(!from_cache);
    assert!(store.contains("http://x").expect("contains"));
}

#[test]
fn force_refetch_overwrites_the_cached_entry() {
    let mut store = LocalKv::open_in_memory(Kind::Text, Kind::Bytes).expect("open");
    let old = CountingDownloader::new(b"version 1");
    cached_fetch(&mut store, &old, "http://x", false).expect("seed");

    let new = CountingDownloader::new(b"version 2");
    let (body, from_cache) = cached_fetch(&mut store, &new, "http://x", true).expect("forced");
    assert_eq!(body, b"version 2");
    assert!(!from_cache, "forced path must report a fresh download");
    assert_eq!(new.calls(), 1);

    let (body, from_cache) = cached_fetch(&mut store, &new, "http://x", false).expect("after");
    assert_eq!(body, b"version 2", "overwrite must be visible");
    assert!(from_cache);
    assert_eq!(new.calls(), 1);
}

#[test]
fn wrong_type_pair_fails_before_any_network_access() {
    let mut store = LocalKv::open_in_memory(Kind::Text, Kind::Text).expect("open");
    let stub = CountingDownloader::new(b"unused");
    let err = cached_fetch(&mut store, &stub, "http://x", false).expect_err("text values");
    assert!(matches!(err, KvError::Config(_)), "{err}");
    assert_eq!(stub.calls(), 0, "the guard must fire before downloading");
}
