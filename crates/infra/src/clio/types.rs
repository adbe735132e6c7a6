//! Clio API response envelopes
//!
//! Every Clio endpoint wraps its payload in a `data` envelope. List
//! endpoints add `meta.paging.next`, a fully-qualified URL for the next
//! page that is absent on the final page.

use serde::Deserialize;

/// Envelope for single-record responses
#[derive(Debug, Deserialize)]
pub(crate) struct RecordEnvelope<T> {
    pub data: T,
}

/// Envelope for list responses with cursor pagination
#[derive(Debug, Deserialize)]
pub(crate) struct ListEnvelope<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl<T> ListEnvelope<T> {
    /// URL of the next page, if the server reported one
    pub(crate) fn next_page_url(&self) -> Option<&str> {
        self.meta.as_ref()?.paging.as_ref()?.next.as_deref()
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Meta {
    #[serde(default)]
    pub paging: Option<Paging>,
    #[serde(default)]
    pub records: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Paging {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}
