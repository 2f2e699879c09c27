use futures::StreamExt;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::io::AsyncWriteExt;

use crate::client::Client;
use crate::error::{ClientError, ClientResult};
use crate::row_reader::RowReader;

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    db_name: &'a str,
    query: &'a str,
}

/// A pull iterator over one query's result set.
///
/// `execute` writes the response body to a spooled temporary file as it
/// arrives rather than buffering it in memory, then hands row-at-a-time
/// reads off to [`RowReader`]. The file (and the `NamedTempFile` guard
/// that deletes it on drop) lives for exactly as long as the cursor.
pub struct Cursor<'a> {
    client: &'a Client,
    reader: RowReader,
    _spill: tempfile::NamedTempFile,
    delivered: bool,
}

impl<'a> Cursor<'a> {
    /// Submit `query` against `client`'s bound database. On a 401 this
    /// performs exactly one transparent refresh-and-retry before
    /// surfacing the failure; because the retry happens here, before any
    /// row has been read off the response, it can never reorder rows
    /// already handed to the caller (see DESIGN.md).
    pub(crate) async fn execute(client: &'a Client, query: &str) -> ClientResult<Cursor<'a>> {
        match Self::send_and_spill(client, query).await {
            Ok((reader, spill)) => Ok(Cursor {
                client,
                reader,
                _spill: spill,
                delivered: false,
            }),
            Err(ClientError::Unauthorized(_)) => {
                client.refresh().await?;
                let (reader, spill) = Self::send_and_spill(client, query).await?;
                Ok(Cursor {
                    client,
                    reader,
                    _spill: spill,
                    delivered: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn send_and_spill(
        client: &Client,
        query: &str,
    ) -> ClientResult<(RowReader, tempfile::NamedTempFile)> {
        let bearer = client.bearer_header().await;
        let resp = client
            .http
            .post(format!("{}/queries/", client.base_url))
            .header(reqwest::header::AUTHORIZATION, bearer)
            .json(&QueryRequest {
                db_name: &client.db_name,
                query,
            })
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized(
                "access token rejected by query endpoint".to_string(),
            ));
        }
        if !resp.status().is_success() {
            return Err(Client::error_from_response(resp).await);
        }

        let spill = tempfile::NamedTempFile::new()
            .map_err(|e| ClientError::Protocol(format!("creating spill file: {e}")))?;
        let mut file = tokio::fs::File::create(spill.path())
            .await
            .map_err(|e| ClientError::Protocol(format!("opening spill file: {e}")))?;

        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ClientError::Protocol(format!("spilling response: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| ClientError::Protocol(format!("spilling response: {e}")))?;

        let reader = RowReader::open(spill.path()).await?;
        Ok((reader, spill))
    }

    /// Return the next row, or `None` once the result set is exhausted.
    pub async fn fetch_one(&mut self) -> ClientResult<Option<JsonValue>> {
        let row = self.reader.next_row().await?;
        if row.is_some() {
            self.delivered = true;
        }
        Ok(row)
    }

    /// Return up to `n` rows, stopping early on exhaustion.
    pub async fn fetch_many(&mut self, n: usize) -> ClientResult<Vec<JsonValue>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.fetch_one().await? {
                Some(row) => out.push(row),
                None => break,
            }
        }
        Ok(out)
    }

    /// Drain the remainder of the result set.
    pub async fn fetch_all(&mut self) -> ClientResult<Vec<JsonValue>> {
        let mut out = Vec::new();
        while let Some(row) = self.fetch_one().await? {
            out.push(row);
        }
        Ok(out)
    }

    /// Whether at least one row has already been handed to the caller
    /// from this cursor. Exposed mainly for tests exercising the
    /// no-reorder retry invariant.
    pub fn has_delivered_rows(&self) -> bool {
        self.delivered
    }
}
