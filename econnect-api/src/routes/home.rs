//! Welcome page

use axum::{response::Html, routing::get, Router};

use crate::AppState;

const WELCOME_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Econnect API</title>
</head>
<body>
    <h1>Econnect API</h1>
    <p>Economic news collected from RSS feeds, summarized and ranked.</p>
    <ul>
        <li><code>POST /auth/register</code>, <code>POST /auth/login</code></li>
        <li><code>GET /news/feed/latest</code>, <code>GET /news/feed/hottest</code></li>
        <li><code>GET /news/feed/liked</code>, <code>POST /news/{id}/like</code></li>
        <li><code>GET /user</code>, <code>PATCH /user</code>, <code>DELETE /user</code></li>
    </ul>
</body>
</html>
"#;

/// GET / - HTML welcome page
async fn welcome() -> Html<&'static str> {
    Html(WELCOME_PAGE)
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(welcome))
}
