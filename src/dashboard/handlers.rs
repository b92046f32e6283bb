use super::library::{format_megabytes, media_type, ClipDetails};
use super::server::DashboardState;
use crate::error::DashboardError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = match &self {
            DashboardError::InvalidComponent { .. } => StatusCode::BAD_REQUEST,
            DashboardError::NotFound { .. } => StatusCode::NOT_FOUND,
            DashboardError::EmptyClip { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DashboardError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            DashboardError::BindFailed { .. }
            | DashboardError::Server { .. }
            | DashboardError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Dashboard request failed: {}", self);
        } else {
            debug!("Dashboard request rejected: {}", self);
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Dates with recordings
pub async fn index_handler(State(state): State<DashboardState>) -> Response {
    let dates = match state.library.list_dates().await {
        Ok(dates) => dates,
        Err(DashboardError::NotFound { path }) => {
            let body = format!(
                "<p class=\"error\">Directory not found: {}</p>\
                 <p>Check the storage path in the configuration.</p>",
                escape_html(&path.display().to_string())
            );
            return (StatusCode::NOT_FOUND, Html(page("Recordings", &body))).into_response();
        }
        Err(e) => return e.into_response(),
    };

    let body = if dates.is_empty() {
        "<p>No recordings available.</p>".to_string()
    } else {
        link_list(dates.iter().map(|date| {
            (format!("/dates/{}", escape_html(date)), escape_html(date))
        }))
    };
    Html(page("Recordings", &body)).into_response()
}

/// Clips recorded on one date
pub async fn date_handler(
    State(state): State<DashboardState>,
    Path(date): Path<String>,
) -> Result<Html<String>, DashboardError> {
    let clips = state.library.list_clips(&date).await?;
    let date_html = escape_html(&date);

    let list = if clips.is_empty() {
        "<p>No clips found for this date.</p>".to_string()
    } else {
        link_list(clips.iter().map(|name| {
            (
                format!("/view/{}/{}", date_html, escape_html(name)),
                escape_html(name),
            )
        }))
    };
    let body = format!("<p><a href=\"/\">All dates</a></p>{}", list);
    Ok(Html(page(&format!("Recordings for {}", date_html), &body)))
}

/// Embedded player with details and a download link
pub async fn view_handler(
    State(state): State<DashboardState>,
    Path((date, name)): Path<(String, String)>,
) -> Response {
    let details = match state.library.clip_details(&date, &name).await {
        Ok(details) => details,
        Err(e @ (DashboardError::EmptyClip { .. } | DashboardError::UnsupportedType { .. })) => {
            debug!("Refusing to play {}/{}: {}", date, name, e);
            let body = format!(
                "<p class=\"error\">Selected clip is invalid or corrupted.</p>\
                 <p><a href=\"/dates/{}\">Back</a></p>",
                escape_html(&date)
            );
            return (StatusCode::UNPROCESSABLE_ENTITY, Html(page("Invalid clip", &body)))
                .into_response();
        }
        Err(e) => return e.into_response(),
    };

    Html(page(&escape_html(&details.name), &player(&details))).into_response()
}

/// Streams the clip file
pub async fn clip_file_handler(
    State(state): State<DashboardState>,
    Path((date, name)): Path<(String, String)>,
) -> Result<Response, DashboardError> {
    let path = state.library.check_clip(&date, &name).await?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|source| DashboardError::Io {
            path: path.clone(),
            source,
        })?;
    let length = file
        .metadata()
        .await
        .map_err(|source| DashboardError::Io {
            path: path.clone(),
            source,
        })?
        .len();

    info!("Serving {} ({})", path.display(), format_megabytes(length));

    let content_type = media_type(&name).unwrap_or("application/octet-stream");
    let disposition = format!("inline; filename=\"{}\"", name.replace('"', ""));
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn api_dates_handler(
    State(state): State<DashboardState>,
) -> Result<Json<Vec<String>>, DashboardError> {
    Ok(Json(state.library.list_dates().await?))
}

pub async fn api_clips_handler(
    State(state): State<DashboardState>,
    Path(date): Path<String>,
) -> Result<Json<Vec<String>>, DashboardError> {
    Ok(Json(state.library.list_clips(&date).await?))
}

pub async fn api_clip_handler(
    State(state): State<DashboardState>,
    Path((date, name)): Path<(String, String)>,
) -> Result<Json<ClipDetails>, DashboardError> {
    Ok(Json(state.library.clip_details(&date, &name).await?))
}

/// Health check endpoint
pub async fn health_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let base = state.library.base_dir();
    let available = tokio::fs::metadata(base)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);

    let health_info = serde_json::json!({
        "status": if available { "healthy" } else { "degraded" },
        "storage": {
            "path": base.display().to_string(),
            "available": available,
        }
    });

    (StatusCode::OK, Json(health_info))
}

fn player(details: &ClipDetails) -> String {
    let src = format!(
        "/clips/{}/{}",
        escape_html(&details.date),
        escape_html(&details.name)
    );
    format!(
        r#"<p><a href="/dates/{date}">Back to {date}</a></p>
<ul class="details">
    <li>Size: {size}</li>
    <li>Created: {created}</li>
    <li>Modified: {modified}</li>
</ul>
<video width="100%" controls autoplay muted>
    <source src="{src}" type="{media_type}">
    Your browser cannot play this clip.
</video>
<p><a href="{src}" download="{name}">Download clip</a></p>
<p class="hint">MP4 clips play in the browser; download AVI clips to play them locally.</p>
"#,
        date = escape_html(&details.date),
        size = details.size,
        created = details.created,
        modified = details.modified,
        src = src,
        media_type = details.media_type,
        name = escape_html(&details.name),
    )
}

fn link_list(links: impl Iterator<Item = (String, String)>) -> String {
    let items: String = links
        .map(|(href, label)| format!("<li><a href=\"{}\">{}</a></li>", href, label))
        .collect();
    format!("<ul>{}</ul>", items)
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        :root {{ color-scheme: dark; }}
        body {{
            margin: 2rem auto;
            max-width: 960px;
            font-family: sans-serif;
            background: #111;
            color: #ddd;
        }}
        a {{ color: #7ab8ff; }}
        .error {{ color: #ff7a7a; }}
        .hint {{ color: #888; font-size: 0.9em; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    {body}
</body>
</html>
"#,
        title = title,
        body = body,
    )
}

pub(super) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
