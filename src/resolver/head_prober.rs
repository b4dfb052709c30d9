//! Production `SizeProber` (spec.md §4.1 step 4: "a conditional HEAD-like
//! probe to the default target"). `reqwest` is the one HTTP-client crate
//! the example pack uses (`spineldb-spineldb`'s remote-fetch layer); pingora
//! itself only drives the proxied request/response path, not speculative
//! out-of-band probes.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::resolver::probe::SizeProber;

pub struct HeadProber {
    client: reqwest::Client,
}

impl HeadProber {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        HeadProber { client }
    }
}

#[async_trait]
impl SizeProber for HeadProber {
    async fn probe_size(&self, url: &Url) -> Option<u64> {
        let response = self.client.head(url.clone()).send().await.ok()?;
        response.content_length()
    }
}
