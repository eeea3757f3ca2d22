//! HTTP object-server backend.
//!
//! Talks to any object server that supports ranged GET, streaming PUT and
//! DELETE. Listing expects one object name per line, which is what our
//! blob servers return. Timeouts live on the client; the core adds none.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Body, Client};
use reqwest::header::RANGE;
use tracing::debug;

use crate::error::{Error, Result};
use crate::hasher::{Md5Sizer, TeeReader};
use crate::id::StorageId;
use crate::util::format_http_range;

use super::{SectionReader, Storage};

pub struct HttpStorage {
    storage_id: StorageId,
    client: Client,
    base: String,
    prefix: String,
}

impl HttpStorage {
    pub fn new(storage_id: StorageId, server_url: &str, root_path: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            storage_id,
            client,
            base: server_url.trim_end_matches('/').to_string(),
            prefix: root_path.trim_matches('/').to_string(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}/{}", self.base, path)
        } else {
            format!("{}/{}/{}", self.base, self.prefix, path)
        }
    }
}

impl Storage for HttpStorage {
    fn id(&self) -> StorageId {
        self.storage_id
    }

    fn download_section(&self, path: &str, offset: u64, length: u64) -> Result<SectionReader> {
        if length == 0 {
            // An inclusive-inclusive Range header cannot express zero bytes.
            return Ok(Box::new(io::empty()));
        }
        let url = self.object_url(path);
        debug!(url, offset, length, "ranged download");
        let resp = self
            .client
            .get(&url)
            .header(RANGE, format_http_range(offset, length))
            .send()?
            .error_for_status()?;
        // A server that ignores the Range header sends the whole object;
        // that is only usable when the range started at zero.
        match resp.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::OK if offset == 0 => {}
            status => {
                return Err(Error::Backend(format!(
                    "{url}: expected partial content, got {status}"
                )));
            }
        }
        Ok(Box::new(resp.take(length)))
    }

    fn upload(&self, path: &str, data: SectionReader) -> Result<Option<String>> {
        let url = self.object_url(path);
        // Object stores report MD5-style checksums; compute ours while the
        // body streams out so we never buffer the object.
        let sizer = Arc::new(Md5Sizer::new());
        let body = Body::new(TeeReader::new(data, sizer.clone()));
        self.client.put(&url).body(body).send()?.error_for_status()?;
        debug!(url, bytes = sizer.size(), "uploaded object");
        Ok(Some(hex::encode(sizer.finish())))
    }

    fn list(&self) -> Result<Vec<String>> {
        let url = if self.prefix.is_empty() {
            self.base.clone()
        } else {
            format!("{}/{}", self.base, self.prefix)
        };
        let text = self
            .client
            .get(&url)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(text
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let url = self.object_url(path);
        self.client.delete(&url).send()?.error_for_status()?;
        Ok(())
    }
}
