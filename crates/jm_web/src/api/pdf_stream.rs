use std::io::SeekFrom;
use std::path::Path;

use anyhow::{bail, Context, Result};
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

/// 闭区间字节范围
#[derive(Debug, PartialEq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

/// 只支持单个区间，多区间请求按无效处理
pub fn parse_range_header(range_header: &str, file_size: u64) -> Result<RangeSpec> {
    let Some(range_part) = range_header.trim().strip_prefix("bytes=") else {
        bail!("Invalid range header format");
    };
    if file_size == 0 {
        bail!("Range on empty file");
    }
    let Some((start, end)) = range_part.split_once('-') else {
        bail!("Invalid range format");
    };
    if end.contains('-') || range_part.contains(',') {
        bail!("Multiple ranges are not supported");
    }

    let last = file_size - 1;
    let (start, end) = if start.is_empty() {
        // 后缀形式：最后 N 字节
        let suffix_length = end.parse::<u64>().context("Invalid suffix range")?;
        if suffix_length == 0 {
            bail!("Empty suffix range");
        }
        (file_size.saturating_sub(suffix_length), last)
    } else {
        let start = start.parse::<u64>().context("Invalid start position")?;
        let end = if end.is_empty() {
            last
        } else {
            end.parse::<u64>().context("Invalid end position")?.min(last)
        };
        (start, end)
    };

    if start > end {
        bail!("Invalid range: start > end");
    }
    Ok(RangeSpec { start, end })
}

/// 以内联方式返回 PDF，带 Range 头时返回 206
pub async fn serve_pdf(path: &Path, headers: &HeaderMap) -> Result<Response> {
    let mut file = File::open(path)
        .await
        .with_context(|| format!("无法打开文件: {}", path.display()))?;
    let file_size = file.metadata().await.context("读取文件信息失败")?.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| match parse_range_header(value, file_size) {
            Ok(range) => Some(range),
            Err(e) => {
                debug!("忽略无效的 Range 头 {}: {}", value, e);
                None
            }
        });

    let (status, start, content_length) = match &range {
        Some(range) => (StatusCode::PARTIAL_CONTENT, range.start, range.end - range.start + 1),
        None => (StatusCode::OK, 0, file_size),
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await.context("文件定位失败")?;
    }
    let body = Body::from_stream(ReaderStream::new(file.take(content_length)));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let response_headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or(mime_guess::mime::APPLICATION_PDF);
    response_headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(mime.as_ref())?);
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(range) = &range {
        response_headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {}-{}/{}", range.start, range.end, file_size))?,
        );
    }
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        response_headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_str(&format!(
                "inline; filename*=UTF-8''{}",
                utf8_percent_encode(name, NON_ALPHANUMERIC)
            ))?,
        );
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-99", 1000).unwrap(), RangeSpec { start: 0, end: 99 });
        assert_eq!(parse_range_header("bytes=900-", 1000).unwrap(), RangeSpec { start: 900, end: 999 });
        assert_eq!(parse_range_header("bytes=-100", 1000).unwrap(), RangeSpec { start: 900, end: 999 });
        assert_eq!(parse_range_header("bytes=-5000", 1000).unwrap(), RangeSpec { start: 0, end: 999 });
        assert_eq!(parse_range_header("bytes=10-5000", 1000).unwrap(), RangeSpec { start: 10, end: 999 });
    }

    #[test]
    fn test_parse_invalid_range_header() {
        assert!(parse_range_header("items=0-1", 1000).is_err());
        assert!(parse_range_header("bytes=5-1", 1000).is_err());
        assert!(parse_range_header("bytes=1000-", 1000).is_err());
        assert!(parse_range_header("bytes=0-1,5-9", 1000).is_err());
        assert!(parse_range_header("bytes=abc-", 1000).is_err());
        assert!(parse_range_header("bytes=-0", 1000).is_err());
        assert!(parse_range_header("bytes=0-0", 0).is_err());
    }
}
