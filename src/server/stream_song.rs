//! Song file download with byte range support.

use super::catalog_routes::{attachment_disposition, with_store};
use super::state::{GuardedCatalogStore, ServerState};
use axum::{
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

const HEADER_BYTE_RANGE: &str = "Range";
const STREAM_BUFFER_SIZE: usize = 4096 * 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref().strip_prefix("bytes=")?;
        let (start, end) = v.split_once('-')?;
        if end.contains('-') {
            return None;
        }

        Some(ByteRange {
            start_inclusive: start.trim().parse::<u64>().ok(),
            end_inclusive: end.trim().parse::<u64>().ok(),
        })
    }

    /// Inclusive `(first, last)` byte offsets within a file of `length` bytes,
    /// or `None` when the range can't be satisfied.
    fn resolve(&self, length: u64) -> Option<(u64, u64)> {
        if length == 0 {
            return None;
        }
        let last_byte = length - 1;
        let (first, last) = match (self.start_inclusive, self.end_inclusive) {
            (None, None) => (0, last_byte),
            // Suffix range: the final `n` bytes.
            (None, Some(n)) => {
                if n == 0 {
                    return None;
                }
                (length.saturating_sub(n), last_byte)
            }
            (Some(start), None) => (start, last_byte),
            (Some(start), Some(end)) => (start, end.min(last_byte)),
        };
        if first > last || first > last_byte {
            return None;
        }
        Some((first, last))
    }
}

pub struct ByteRangeExtractionError {}

impl IntoResponse for ByteRangeExtractionError {
    fn into_response(self) -> Response {
        StatusCode::BAD_REQUEST.into_response()
    }
}

impl FromRequestParts<ServerState> for Option<ByteRange> {
    type Rejection = ByteRangeExtractionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .and_then(|x| x.to_str().ok())
            .and_then(ByteRange::parse))
    }
}

fn content_type_for(path: &std::path::Path) -> String {
    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

pub async fn stream_song(
    byte_range: Option<ByteRange>,
    State(catalog_store): State<GuardedCatalogStore>,
    Path(id): Path<i64>,
) -> Response {
    let song = match with_store(catalog_store, move |s| s.get_song(id)).await {
        Ok(Some(song)) => song,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(resp) => return resp,
    };

    let path = PathBuf::from(&song.filepath);
    debug!("Streaming song {} from path {}", song.id, path.display());

    let mut file = match File::open(&path).await {
        Err(_) => {
            debug!("Song {} file not available", song.id);
            return StatusCode::NOT_FOUND.into_response();
        }
        Ok(x) => x,
    };

    let file_length = match file.metadata().await {
        Ok(x) => x.len(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let content_type = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || content_type_for(&path))
            .await
            .unwrap_or_else(|_| "application/octet-stream".to_string())
    };

    let (status_code, first, last) = match byte_range {
        None => (StatusCode::OK, 0, file_length.saturating_sub(1)),
        Some(range) => match range.resolve(file_length) {
            Some((first, last)) => (StatusCode::PARTIAL_CONTENT, first, last),
            None => {
                return Response::builder()
                    .status(StatusCode::RANGE_NOT_SATISFIABLE)
                    .header(header::CONTENT_RANGE, format!("bytes */{}", file_length))
                    .body(Body::empty())
                    .unwrap_or_else(|_| StatusCode::RANGE_NOT_SATISFIABLE.into_response());
            }
        },
    };
    let chunk_size = if file_length == 0 { 0 } else { last - first + 1 };

    if first > 0 && file.seek(SeekFrom::Start(first)).await.is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let file_reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file.take(chunk_size));
    let stream = ReaderStream::with_capacity(file_reader, STREAM_BUFFER_SIZE);

    let mut builder = Response::builder()
        .status(status_code)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, chunk_size)
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&song.filename),
        );
    if status_code == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", first, last, file_length),
        );
    }

    builder
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::ByteRange;

    fn assert_byte_range(s: &str, a: Option<u64>, b: Option<u64>) {
        assert_eq!(ByteRange::parse(s), Some(ByteRange::new(a, b)));
    }

    fn assert_no_byte_range(s: &str) {
        assert_eq!(ByteRange::parse(s), None);
    }

    #[test]
    fn parses_byte_range() {
        assert_no_byte_range("asd");
        assert_no_byte_range("bytes=");
        assert_no_byte_range("bytes=1-2-3");
        assert_byte_range("bytes=-", None, None);
        assert_byte_range("bytes=11-", Some(11), None);
        assert_byte_range("bytes=-111", None, Some(111));
        assert_byte_range("bytes=11-111", Some(11), Some(111));
    }

    #[test]
    fn resolves_ranges_against_file_length() {
        assert_eq!(ByteRange::new(None, None).resolve(100), Some((0, 99)));
        assert_eq!(ByteRange::new(Some(10), None).resolve(100), Some((10, 99)));
        assert_eq!(ByteRange::new(Some(10), Some(19)).resolve(100), Some((10, 19)));
        assert_eq!(ByteRange::new(Some(90), Some(500)).resolve(100), Some((90, 99)));
        assert_eq!(ByteRange::new(None, Some(10)).resolve(100), Some((90, 99)));
        assert_eq!(ByteRange::new(None, Some(500)).resolve(100), Some((0, 99)));
    }

    #[test]
    fn unsatisfiable_ranges() {
        assert_eq!(ByteRange::new(Some(100), None).resolve(100), None);
        assert_eq!(ByteRange::new(Some(20), Some(10)).resolve(100), None);
        assert_eq!(ByteRange::new(None, Some(0)).resolve(100), None);
        assert_eq!(ByteRange::new(None, None).resolve(0), None);
    }
}
