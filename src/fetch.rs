//! Cached fetching: at most one network download per distinct URL.
//!
//! A (text, bytes) store doubles as a download cache. [`cached_fetch`]
//! consults the store first, downloads on a miss, and writes the result
//! back with an immediate durable commit before returning, so a restart
//! between two calls still observes the cache hit. A failed download is
//! never written; retrying later always remains possible.
//!
//! The download primitive sits behind [`Downloader`] so collectors and
//! tests can substitute their own transport.

use crate::error::KvError;
use crate::store::LocalKv;
use crate::value::Kind;
use std::time::Duration;

const USER_AGENT: &str = concat!("lexkv/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// The network primitive consumed by [`cached_fetch`].
///
/// Implementations must fail with [`KvError::Fetch`] on non-success status
/// or transport failure; no retrying is expected here.
pub trait Downloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, KvError>;
}

/// Blocking HTTP downloader with a bounded timeout and an identifiable
/// User-Agent. Redirects follow reqwest's default policy.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, KvError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, KvError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| KvError::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, KvError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| KvError::Fetch(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(KvError::Fetch(format!("{url}: HTTP status {status}")));
        }
        let bytes = response
            .bytes()
            .map_err(|e| KvError::Fetch(format!("{url}: reading body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Fetch `url`, using `store` as an authoritative cache.
///
/// Returns the content and whether it came from the cache. Absent
/// `force_refetch`, a cached URL is returned without any network access.
/// On a miss the downloaded bytes are upserted and committed before this
/// function returns (an open batch on the handle is committed along with
/// them, per the store's commit semantics).
pub fn cached_fetch(
    store: &mut LocalKv,
    downloader: &dyn Downloader,
    url: &str,
    force_refetch: bool,
) -> Result<(Vec<u8>, bool), KvError> {
    check_cache_store(store)?;

    if !force_refetch {
        if let Some(hit) = store.get_opt(url)? {
            let bytes = hit.as_bytes().map(<[u8]>::to_vec).ok_or_else(|| {
                KvError::TypeMismatch(format!(
                    "cached entry for '{url}' holds {}, expected bytes",
                    hit.kind_name()
                ))
            })?;
            return Ok((bytes, true));
        }
    }

    let bytes = downloader.download(url)?;
    store.put(url, bytes.clone(), true)?;
    Ok((bytes, false))
}

/// A cache store must accept text keys and bytes values. This is the one
/// place the library demands a specific type pair of its caller.
fn check_cache_store(store: &LocalKv) -> Result<(), KvError> {
    let key_ok = matches!(store.key_kind(), Kind::Text | Kind::Any);
    let value_ok = matches!(store.value_kind(), Kind::Bytes | Kind::Any);
    if key_ok && value_ok {
        return Ok(());
    }
    Err(KvError::Config(format!(
        "cached_fetch needs a (text, bytes) store, got ({}, {})",
        store.key_kind(),
        store.value_kind()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverCalled;

    impl Downloader for NeverCalled {
        fn download(&self, url: &str) -> Result<Vec<u8>, KvError> {
            panic!("download must not be reached for {url}");
        }
    }

    #[test]
    fn incompatible_type_pair_is_a_configuration_error() {
        let mut store = LocalKv::open_in_memory(Kind::Integer, Kind::Float).expect("open");
        let err = cached_fetch(&mut store, &NeverCalled, "http://example.invalid", false)
            .expect_err("must reject (integer, float)");
        assert!(matches!(err, KvError::Config(_)), "{err}");
    }

    #[test]
    fn unconstrained_store_is_accepted() {
        let mut store = LocalKv::open_in_memory(Kind::Any, Kind::Any).expect("open");
        store
            .put("http://example.invalid/a", &b"cached"[..], true)
            .expect("seed");
        let (bytes, from_cache) =
            cached_fetch(&mut store, &NeverCalled, "http://example.invalid/a", false)
                .expect("hit");
        assert_eq!(bytes, b"cached");
        assert!(from_cache);
    }
}
