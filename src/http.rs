//! Blocking HTTP client for the remote file store.

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{
    blocking::{Client, Response},
    header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    StatusCode,
};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::{
    merkle_proof::MerkleProof,
    transport::{BatchSender, TransportError},
};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpClient { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the inclusion proof the store holds for file `id`
    pub fn get_proof(&self, id: &str) -> Result<MerkleProof, TransportError> {
        let url = format!("{}/files/get-proof/{id}", self.base_url);
        let res = self.client.get(&url).send()?;
        let res = expect_ok(res, id)?;

        let body = res.bytes()?;
        Ok(MerkleProof::from_json_slice(&body)?)
    }

    /// Downloads file `id`, returning its name and content
    pub fn get_file(&self, id: &str) -> Result<(String, Vec<u8>), TransportError> {
        let url = format!("{}/files/download/{id}", self.base_url);
        let res = self.client.get(&url).send()?;
        let res = expect_ok(res, id)?;

        let file_name = res
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(file_name_from_disposition)
            .ok_or(TransportError::MissingFileName)?;

        let body = res.bytes()?;
        Ok((file_name, body.to_vec()))
    }

    pub fn delete_all_files(&self) -> Result<(), TransportError> {
        let url = format!("{}/files/delete-all", self.base_url);
        let res = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()?;
        debug!(status = %res.status(), "deleted remote files");

        Ok(())
    }

    /// Replaces the stored content of file `id`, used to demonstrate a failed verification
    pub fn corrupt_file(&self, id: &str, data: &[u8]) -> Result<(), TransportError> {
        let url = format!("{}/files/corrupt-file/{id}", self.base_url);
        let res = self.client.post(&url).json(&STANDARD.encode(data)).send()?;
        expect_ok(res, id)?;

        Ok(())
    }

    pub fn ping(&self) -> Result<(), TransportError> {
        self.client.get(&self.base_url).send()?;
        Ok(())
    }
}

impl BatchSender for HttpClient {
    fn send_batch(
        &self,
        url: &str,
        transfer_id: &Uuid,
        payload: &[u8],
        complete: bool,
    ) -> Result<StatusCode, TransportError> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec());

        if complete {
            request = request.query(&[("batch-complete", "true")]);
        }

        let res = request.send()?;
        debug!(%transfer_id, status = %res.status(), bytes = payload.len(), complete, "batch sent");

        Ok(res.status())
    }
}

fn expect_ok(res: Response, id: &str) -> Result<Response, TransportError> {
    match res.status() {
        StatusCode::NOT_FOUND => Err(TransportError::RemoteNotFound(id.to_string())),
        status if status != StatusCode::OK => Err(TransportError::UnexpectedStatus(status)),
        _ => Ok(res),
    }
}

/// Extracts `filename` from a `Content-Disposition` header value
pub fn file_name_from_disposition(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (key, value) = param.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("filename")
                .then(|| value.trim().trim_matches('"').to_string())
        })
        .filter(|name| !name.is_empty())
}
