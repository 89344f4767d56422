//! Time-boxed full-response cache for rendered pages.

use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use url::form_urlencoded;

/// Shared page cache. Clones refer to the same entries.
///
/// Entries are evicted least-recently-used once `max_entries` is reached, and count as
/// absent once older than the TTL.
#[derive(Clone)]
pub struct PageCache {
    ttl: Duration,
    entries: Arc<Mutex<LruCache<String, CachedResponse>>>,
}

impl PageCache {
    pub fn new(ttl: Duration, max_entries: NonZeroUsize) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(LruCache::new(max_entries))),
        }
    }

    /// A fresh copy of the stored response, unless it is missing or older than the TTL.
    pub async fn get(&self, key: &str) -> Option<Response<Body>> {
        let mut guard = self.entries.lock().await;
        let fresh = guard
            .get(key)
            .is_some_and(|entry| entry.stored_at.elapsed() < self.ttl);
        if !fresh {
            guard.pop(key);
            return None;
        }
        guard.get(key).cloned().map(CachedResponse::into_response)
    }

    pub async fn put(&self, key: String, response: CachedResponse) {
        let mut guard = self.entries.lock().await;
        guard.put(key, response);
    }

    /// Buffer `response`, store it under `key` and hand back an equivalent response.
    pub async fn store_response(
        &self,
        key: &str,
        response: Response,
    ) -> Result<Response, (Response, CacheStoreError)> {
        let (rebuilt, cached) = buffer_response(response).await?;
        self.put(key.to_string(), cached).await;
        Ok(rebuilt)
    }

    /// Drop every entry regardless of age.
    pub async fn clear(&self) {
        let mut guard = self.entries.lock().await;
        guard.clear();
        counter!("yatube_page_cache_clear_total").increment(1);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Cache key for a page request: the path plus the `page` parameter, if any.
///
/// Other query parameters do not change what a cached page renders.
pub fn page_cache_key(path: &str, query: Option<&str>) -> String {
    let page = query.and_then(|query| {
        form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "page")
            .map(|(_, value)| value.into_owned())
    });

    match page {
        Some(page) => form_urlencoded::Serializer::new(format!("{path}?"))
            .append_pair("page", &page)
            .finish(),
        None => path.to_string(),
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    stored_at: Instant,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            body,
            stored_at: Instant::now(),
        }
    }

    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Only successful responses that do not touch the session are shared between visitors.
pub fn should_store_response(response: &Response) -> bool {
    response.status().is_success() && !response.headers().contains_key(header::SET_COOKIE)
}

pub async fn buffer_response(
    response: Response,
) -> Result<(Response, CachedResponse), (Response, CacheStoreError)> {
    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let cached = CachedResponse::new(parts.status, &parts.headers, bytes.clone());
            let rebuilt = Response::from_parts(parts, Body::from(bytes));
            Ok((rebuilt, cached))
        }
        Err(error) => {
            let rebuilt = Response::from_parts(parts, Body::empty());
            Err((rebuilt, CacheStoreError::Buffer(error.to_string())))
        }
    }
}
