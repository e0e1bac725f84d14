use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse},
};

use super::{ApiState, Result};
use crate::api_error::ApiError;

const PLAYER_TEMPLATE: &str = include_str!("../../../assets/player.html");

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn render_player(video_path: &str, title: &str, video_type: &str) -> String {
    PLAYER_TEMPLATE
        .replace("$videoPath", &escape_html(video_path))
        .replace("$title", &escape_html(title))
        .replace("$videoType", &escape_html(video_type))
}

pub async fn h_player(
    State(state): State<ApiState>,
    Path(file_name): Path<String>,
) -> Result<impl IntoResponse> {
    let path = state
        .resolve_video(&file_name)
        .await
        .ok_or_else(|| ApiError::file_not_found(&file_name))?;
    let video_type = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let video_path = state.links.stream_path(&file_name);
    Ok(Html(render_player(&video_path, &file_name, &video_type)))
}
