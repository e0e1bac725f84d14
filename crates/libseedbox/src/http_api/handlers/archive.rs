use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use http::{HeaderMap, HeaderValue, StatusCode, header};

use super::{ApiState, READ_BUFFER_SIZE, Result, insert_header};
use crate::api_error::ApiError;

pub async fn h_archive(
    State(state): State<ApiState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse> {
    let path = state
        .library
        .archive_path(&file_name)
        .await
        .ok_or_else(|| ApiError::file_not_found(&file_name))?;
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("error opening {path:?}"))?;
    let size = file
        .metadata()
        .await
        .with_context(|| format!("error reading metadata of {path:?}"))?
        .len();

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    insert_header(&mut headers, header::CONTENT_LENGTH, size);
    insert_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        format_args!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(&file_name)
        ),
    );

    let s = tokio_util::io::ReaderStream::with_capacity(file, READ_BUFFER_SIZE);
    Ok((StatusCode::OK, (headers, axum::body::Body::from_stream(s))))
}
