use std::time::Duration;

use aguada_embedded::UplinkClient;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::errors::GatewayError;

/// Backend uplink over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUplink {
    client: Client,
}

impl HttpUplink {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aguada-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

impl UplinkClient for HttpUplink {
    type Error = reqwest::Error;

    async fn post_json(&mut self, url: &str, body: &[u8]) -> Result<u16, Self::Error> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        Ok(response.status().as_u16())
    }
}
