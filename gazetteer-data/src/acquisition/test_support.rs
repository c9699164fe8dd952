//! In-memory remote source for acquisition tests.
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;

use super::{RemoteSource, TransportError};

/// Stub [`RemoteSource`] serving registered byte bodies by URL.
///
/// Counts size probes and transfers so tests can assert on cache hits.
#[derive(Debug, Default)]
pub struct StubRemoteSource {
    files: RefCell<HashMap<String, Vec<u8>>>,
    downloads: Cell<usize>,
    probes: Cell<usize>,
    failing_probes: bool,
}

impl StubRemoteSource {
    /// An empty stub; every URL answers 404.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` under `url`.
    pub fn with_file(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.set_file(url, body);
        self
    }

    /// Make every size probe fail with HTTP 503.
    pub fn with_failing_probes(mut self) -> Self {
        self.failing_probes = true;
        self
    }

    /// Replace the body served for `url`.
    pub fn set_file(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(url.into(), body.into());
    }

    /// Number of completed or attempted transfers.
    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }

    /// Number of size probes.
    pub fn probes(&self) -> usize {
        self.probes.get()
    }

    fn not_found(url: &str) -> TransportError {
        TransportError::Http {
            url: url.to_owned(),
            status: 404,
        }
    }
}

#[async_trait(?Send)]
impl RemoteSource for StubRemoteSource {
    async fn content_length(&self, url: &str) -> Result<Option<u64>, TransportError> {
        self.probes.set(self.probes.get() + 1);
        if self.failing_probes {
            return Err(TransportError::Http {
                url: url.to_owned(),
                status: 503,
            });
        }
        self.files
            .borrow()
            .get(url)
            .map(|body| Some(body.len() as u64))
            .ok_or_else(|| Self::not_found(url))
    }

    async fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        self.downloads.set(self.downloads.get() + 1);
        let files = self.files.borrow();
        let body = files.get(url).ok_or_else(|| Self::not_found(url))?;
        sink.write_all(body)
            .map_err(|source| TransportError::Sink {
                url: url.to_owned(),
                source,
            })?;
        Ok(body.len() as u64)
    }
}
