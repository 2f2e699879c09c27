use serde_json::Value as JsonValue;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::{ClientError, ClientResult};

/// Incrementally decodes the row objects out of a spilled JSON-array
/// response file, one object at a time, without ever holding the whole
/// array in memory at once. The mirror image of
/// `flatbase_engine::framing::json_array_chunks` on the encode side:
/// both sides track bracket/quote state explicitly rather than treat the
/// array as one opaque JSON document.
pub struct RowReader {
    reader: BufReader<File>,
    pending: Option<u8>,
    done: bool,
}

impl RowReader {
    /// Open `path` and consume its leading `[`. The file is expected to
    /// be a complete, well-formed response already spilled to disk by
    /// [`crate::cursor::Cursor::execute`].
    pub async fn open(path: &std::path::Path) -> ClientResult<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| ClientError::Protocol(format!("opening spilled result {path:?}: {e}")))?;
        let mut reader = RowReader {
            reader: BufReader::new(file),
            pending: None,
            done: false,
        };
        reader.skip_whitespace().await?;
        match reader.read_byte().await? {
            Some(b'[') => {}
            Some(other) => {
                return Err(ClientError::Protocol(format!(
                    "expected '[' at start of response, found byte {other}"
                )))
            }
            None => return Err(ClientError::Protocol("empty response body".to_string())),
        }
        Ok(reader)
    }

    /// Return the next row object, or `None` once the closing `]` has
    /// been consumed.
    pub async fn next_row(&mut self) -> ClientResult<Option<JsonValue>> {
        if self.done {
            return Ok(None);
        }
        self.skip_whitespace_and_commas().await?;
        match self.peek_byte().await? {
            None => {
                return Err(ClientError::Protocol(
                    "response ended before closing ']'".to_string(),
                ))
            }
            Some(b']') => {
                self.read_byte().await?;
                self.done = true;
                return Ok(None);
            }
            Some(_) => {}
        }

        let mut buf = Vec::new();
        let mut depth: i32 = 0;
        let mut in_string = false;
        let mut escape = false;
        loop {
            let byte = self.read_byte().await?.ok_or_else(|| {
                ClientError::Protocol("response ended mid-value".to_string())
            })?;
            buf.push(byte);

            if in_string {
                if escape {
                    escape = false;
                } else if byte == b'\\' {
                    escape = true;
                } else if byte == b'"' {
                    in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }

        let text = String::from_utf8(buf)
            .map_err(|e| ClientError::Protocol(format!("non-UTF8 row bytes: {e}")))?;
        let value = serde_json::from_str(&text)
            .map_err(|e| ClientError::Protocol(format!("malformed row JSON: {e}")))?;
        Ok(Some(value))
    }

    async fn skip_whitespace(&mut self) -> ClientResult<()> {
        loop {
            match self.peek_byte().await? {
                Some(b) if b.is_ascii_whitespace() => {
                    self.read_byte().await?;
                }
                _ => return Ok(()),
            }
        }
    }

    async fn skip_whitespace_and_commas(&mut self) -> ClientResult<()> {
        loop {
            match self.peek_byte().await? {
                Some(b) if b.is_ascii_whitespace() || b == b',' => {
                    self.read_byte().await?;
                }
                _ => return Ok(()),
            }
        }
    }

    async fn peek_byte(&mut self) -> ClientResult<Option<u8>> {
        if self.pending.is_none() {
            self.pending = self.read_raw_byte().await?;
        }
        Ok(self.pending)
    }

    async fn read_byte(&mut self) -> ClientResult<Option<u8>> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        self.read_raw_byte().await
    }

    async fn read_raw_byte(&mut self) -> ClientResult<Option<u8>> {
        match self.reader.read_u8().await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(ClientError::Protocol(format!("reading spilled result: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn reader_over(contents: &str) -> (RowReader, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let reader = RowReader::open(file.path()).await.unwrap();
        (reader, file)
    }

    #[tokio::test]
    async fn reads_rows_in_order() {
        let (mut reader, _file) = reader_over("[{\"a\":1},\n{\"a\":2}]").await;
        assert_eq!(reader.next_row().await.unwrap(), Some(serde_json::json!({"a": 1})));
        assert_eq!(reader.next_row().await.unwrap(), Some(serde_json::json!({"a": 2})));
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_array_yields_no_rows() {
        let (mut reader, _file) = reader_over("[]").await;
        assert_eq!(reader.next_row().await.unwrap(), None);
    }

    #[tokio::test]
    async fn handles_nested_objects_and_escaped_quotes() {
        let (mut reader, _file) =
            reader_over("[{\"name\":\"a \\\"quoted\\\" value\",\"nested\":{\"x\":1}}]").await;
        let row = reader.next_row().await.unwrap().unwrap();
        assert_eq!(row["name"], "a \"quoted\" value");
        assert_eq!(row["nested"]["x"], 1);
    }
}
