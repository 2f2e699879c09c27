use futures::stream::Stream;
use serde_json::Value as JsonValue;

use crate::error::EngineError;

enum FramingState<S> {
    Open(S),
    Rows { inner: S, first: bool },
    Done,
}

/// Wrap a row stream into a sequence of UTF-8 chunks forming a single
/// top-level JSON array: `[`, then each row separated by `,\n`, then `]`.
/// Bracket and comma placement is tracked explicitly as state rather than
/// built by ad-hoc string concatenation.
///
/// If the inner stream yields an error, that error is forwarded as the
/// final chunk and the closing `]` is never emitted: the array is left
/// unterminated, matching the wire's documented behaviour of not framing
/// trailing errors once bytes have started flowing.
pub fn json_array_chunks<S>(rows: S) -> impl Stream<Item = Result<String, EngineError>>
where
    S: Stream<Item = Result<JsonValue, EngineError>> + Unpin,
{
    futures::stream::unfold(FramingState::Open(rows), |state| async move {
        match state {
            FramingState::Open(inner) => Some((
                Ok("[".to_string()),
                FramingState::Rows { inner, first: true },
            )),
            FramingState::Rows { mut inner, first } => {
                use futures::StreamExt;
                match inner.next().await {
                    Some(Ok(row)) => {
                        let prefix = if first { "" } else { ",\n" };
                        let chunk = format!("{prefix}{row}");
                        Some((Ok(chunk), FramingState::Rows { inner, first: false }))
                    }
                    Some(Err(e)) => Some((Err(e), FramingState::Done)),
                    None => Some((Ok("]".to_string()), FramingState::Done)),
                }
            }
            FramingState::Done => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use futures::StreamExt;

    #[tokio::test]
    async fn frames_empty_stream_as_empty_array() {
        let rows = futures::stream::empty();
        let chunks: Vec<_> = json_array_chunks(rows).collect().await;
        let joined: String = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(joined, "[]");
    }

    #[tokio::test]
    async fn frames_rows_with_comma_separators() {
        let rows = futures::stream::iter(vec![
            Ok(serde_json::json!({"a": 1})),
            Ok(serde_json::json!({"a": 2})),
        ]);
        let chunks: Vec<_> = json_array_chunks(rows).collect().await;
        let joined: String = chunks.into_iter().map(|c| c.unwrap()).collect();
        assert_eq!(joined, "[{\"a\":1},\n{\"a\":2}]");
    }

    #[tokio::test]
    async fn leaves_array_unterminated_on_mid_stream_error() {
        let rows = futures::stream::iter(vec![
            Ok(serde_json::json!({"a": 1})),
            Err(EngineError::new(ErrorKind::Data, "boom")),
        ]);
        let chunks: Vec<_> = json_array_chunks(rows).collect().await;
        assert!(chunks.last().unwrap().is_err());
        let ok_prefix: String = chunks
            .iter()
            .take_while(|c| c.is_ok())
            .map(|c| c.as_ref().unwrap().clone())
            .collect();
        assert_eq!(ok_prefix, "[{\"a\":1}");
    }
}
