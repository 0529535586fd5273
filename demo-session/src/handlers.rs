use axum::{
    Form,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use websession_axum::{CurrentSession, IntoResponseError};

const LOGIN_FORM: &str = r#"<!doctype html>
<html>
<body>
<form action="/login" method="post">
  Username: <input type="text" name="username">
  <input type="submit" value="Login">
</form>
</body>
</html>
"#;

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub(crate) async fn index(session: CurrentSession) -> Result<Response, (StatusCode, String)> {
    let visits = session
        .get("visits")
        .await
        .into_response_error()?
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
        + 1;
    session
        .set("visits", json!(visits))
        .await
        .into_response_error()?;

    let greeting = match session.get("username").await.into_response_error()? {
        Some(name) => format!("Hello, {}!", escape_html(name.as_str().unwrap_or("stranger"))),
        None => "Hello, anonymous visitor. <a href=\"/login\">Login</a>".to_string(),
    };

    let body = format!(
        "<p>{greeting}</p>\n<p>Visits in this session: {visits}</p>\n\
         <p><a href=\"/session/summary\">Summary</a> | <a href=\"/session/logout\">Logout</a></p>"
    );
    Ok(Html(body).into_response())
}

pub(crate) async fn login_form() -> Html<&'static str> {
    Html(LOGIN_FORM)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginForm {
    username: String,
}

pub(crate) async fn login(
    session: CurrentSession,
    Form(form): Form<LoginForm>,
) -> Result<Response, (StatusCode, String)> {
    let username = form.username.trim();
    if username.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Username is required".to_string()));
    }

    session
        .set("username", json!(username))
        .await
        .into_response_error()?;
    tracing::info!("User {} logged in to session {}", username, session.id().short());

    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"a&b\"</b>"), "&lt;b&gt;&quot;a&amp;b&quot;&lt;/b&gt;");
        assert_eq!(escape_html("alice"), "alice");
    }
}
