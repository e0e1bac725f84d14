use std::{io::SeekFrom, path::PathBuf};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use super::{ApiState, READ_BUFFER_SIZE, Result, insert_header, media_content_type};
use crate::{api_error::ApiError, http_api::RangeRequest};

async fn resolve(state: &ApiState, file_name: &str) -> Result<PathBuf> {
    state
        .resolve_video(file_name)
        .await
        .ok_or_else(|| ApiError::file_not_found(file_name))
}

async fn open(path: &std::path::Path) -> Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("error opening {path:?}"))?;
    let size = file
        .metadata()
        .await
        .with_context(|| format!("error reading metadata of {path:?}"))?
        .len();
    Ok((file, size))
}

/// Sends the whole file.
pub async fn h_download(
    State(state): State<ApiState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse> {
    let path = resolve(&state, &file_name).await?;
    let (file, size) = open(&path).await?;
    trace!(?path, size, "full download");

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, header::CONTENT_TYPE, media_content_type(&path));
    insert_header(&mut headers, header::CONTENT_LENGTH, size);

    let s = tokio_util::io::ReaderStream::with_capacity(file, READ_BUFFER_SIZE);
    Ok((
        StatusCode::OK,
        (headers, axum::body::Body::from_stream(s)),
    ))
}

/// Sends the file, or the single byte range asked for in the `Range` header.
pub async fn h_stream(
    State(state): State<ApiState>,
    Path(file_name): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let path = resolve(&state, &file_name).await?;
    let (mut file, size) = open(&path).await?;

    let mut status = StatusCode::OK;
    let mut output_headers = HeaderMap::new();
    output_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    insert_header(
        &mut output_headers,
        header::CONTENT_TYPE,
        media_content_type(&path),
    );

    let range_header = headers.get(header::RANGE);
    trace!(?path, range=?range_header, "request for HTTP stream");

    // An unusable range is ignored and the whole file is sent.
    let range = range_header
        .and_then(|v| v.to_str().ok())
        .and_then(|v| match RangeRequest::parse(v, size) {
            Ok(range) => Some(range),
            Err(e) => {
                debug!(?path, size, "ignoring range: {e:#}");
                None
            }
        });

    let len = match range {
        Some(range) => {
            status = StatusCode::PARTIAL_CONTENT;
            file.seek(SeekFrom::Start(range.start))
                .await
                .context("error seeking")?;
            insert_header(
                &mut output_headers,
                header::CONTENT_RANGE,
                range.content_range(size),
            );
            range.len()
        }
        None => size,
    };
    insert_header(&mut output_headers, header::CONTENT_LENGTH, len);

    let s = tokio_util::io::ReaderStream::with_capacity(file.take(len), READ_BUFFER_SIZE);
    Ok((status, (output_headers, axum::body::Body::from_stream(s))))
}
