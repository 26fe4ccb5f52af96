//! HTML pages rendered by the gateway itself.
//!
//! There are only two layouts: the error page used by the login flow and
//! the 404 page for unknown gateway paths. Both are plain string templates
//! with every dynamic value escaped.

use axum::{
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use std::fmt::Write as _;

use crate::routes::{RouteKey, Routes, UrlKind};

/// Stylesheet served at the gateway's static route.
pub const STYLESHEET: &str = r#"
:root { --fg: #1f2328; --muted: #59636e; --danger: #d1242f; --bg: #f6f8fa; }
* { box-sizing: border-box; }
body {
  margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
  font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif;
  color: var(--fg); background: var(--bg);
}
main { max-width: 32rem; padding: 2rem; background: #fff; border-radius: 8px;
  box-shadow: 0 1px 3px rgba(0, 0, 0, 0.12); }
h1 { margin: 0 0 0.5rem; font-size: 1.5rem; }
p.subtitle { margin: 0 0 1rem; color: var(--muted); }
.alert { padding: 0.75rem 1rem; margin-bottom: 1rem; border: 1px solid var(--danger);
  border-radius: 6px; color: var(--danger); word-break: break-word; }
.actions { display: flex; gap: 0.5rem; flex-wrap: wrap; margin-top: 1.5rem; }
a.button { padding: 0.5rem 1rem; border-radius: 6px; background: var(--fg); color: #fff;
  text-decoration: none; }
code { font-size: 0.9em; }
"#;

/// An action link rendered as a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    label: String,
    url: String,
}

impl Button {
    /// Creates a button.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Content of an error page.
#[derive(Debug, Clone)]
pub struct ErrorPage {
    status: StatusCode,
    title: String,
    subtitle: String,
    message: Option<String>,
    note: Option<String>,
    buttons: Vec<Button>,
}

impl ErrorPage {
    /// Creates a page with the given status, title and subtitle.
    pub fn new(status: StatusCode, title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            status,
            title: title.into(),
            subtitle: subtitle.into(),
            message: None,
            note: None,
            buttons: Vec::new(),
        }
    }

    /// 400 page for a malformed or forged login request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "Bad Request: 400",
            "Something went wrong with the login request.",
        )
        .with_message(message)
    }

    /// 500 page for a failed sign-in.
    pub fn sign_in_failed(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error: 500",
            "Something went wrong when signing you in.",
        )
        .with_message(message)
    }

    /// Sets the highlighted message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the extra paragraph below the message.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Appends an action button.
    #[must_use]
    pub fn with_button(mut self, button: Button) -> Self {
        self.buttons.push(button);
        self
    }

    /// Returns the HTTP status of the page.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Renders gateway pages with links resolved against the route table.
#[derive(Debug, Clone)]
pub struct Views {
    stylesheet: String,
    prefix: String,
    login: String,
    logout: String,
    health: String,
}

impl Views {
    /// Creates a renderer for the given routes.
    #[must_use]
    pub fn new(routes: &Routes) -> Self {
        Self {
            stylesheet: routes.uri(RouteKey::Stylesheet, UrlKind::Path),
            prefix: routes.prefix().to_string(),
            login: routes.uri(RouteKey::Login, UrlKind::Path),
            logout: routes.uri(RouteKey::Logout, UrlKind::Path),
            health: routes.uri(RouteKey::Health, UrlKind::Path),
        }
    }

    /// Renders an error page.
    #[must_use]
    pub fn error_page(&self, page: &ErrorPage) -> Response {
        let mut body = String::new();
        if let Some(message) = &page.message {
            let _ = writeln!(body, r#"<div class="alert">{}</div>"#, escape(message));
        }
        if let Some(note) = &page.note {
            let _ = writeln!(body, "<p>{}</p>", escape(note));
        }
        if !page.buttons.is_empty() {
            body.push_str(r#"<div class="actions">"#);
            for button in &page.buttons {
                let _ = write!(
                    body,
                    r#"<a class="button" href="{}">{}</a>"#,
                    escape(&button.url),
                    escape(&button.label)
                );
            }
            body.push_str("</div>\n");
        }

        let html = self.layout(&page.title, &page.subtitle, &body);
        (page.status, Html(html)).into_response()
    }

    /// Renders the 404 page for unknown gateway paths.
    #[must_use]
    pub fn not_found(&self) -> Response {
        let body = format!(
            concat!(
                "<p>This path is reserved by the authentication gateway under <code>{}</code>.</p>\n",
                "<ul>\n",
                "<li>Sign in: <a href=\"{login}\"><code>{login}</code></a></li>\n",
                "<li>Sign out: <a href=\"{logout}\"><code>{logout}</code></a></li>\n",
                "<li>Health: <a href=\"{health}\"><code>{health}</code></a></li>\n",
                "</ul>\n",
            ),
            escape(&self.prefix),
            login = escape(&self.login),
            logout = escape(&self.logout),
            health = escape(&self.health),
        );
        let html = self.layout("Not Found: 404", "There is nothing here.", &body);
        (StatusCode::NOT_FOUND, Html(html)).into_response()
    }

    fn layout(&self, title: &str, subtitle: &str, body: &str) -> String {
        format!(
            concat!(
                "<!DOCTYPE html>\n",
                "<html lang=\"en\">\n",
                "<head>\n",
                "<meta charset=\"utf-8\">\n",
                "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
                "<title>{title}</title>\n",
                "<link rel=\"stylesheet\" href=\"{stylesheet}\">\n",
                "</head>\n",
                "<body>\n",
                "<main>\n",
                "<h1>{title}</h1>\n",
                "<p class=\"subtitle\">{subtitle}</p>\n",
                "{body}",
                "</main>\n",
                "</body>\n",
                "</html>\n",
            ),
            title = escape(title),
            stylesheet = escape(&self.stylesheet),
            subtitle = escape(subtitle),
            body = body,
        )
    }
}

/// Serves [`STYLESHEET`].
pub async fn stylesheet() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLESHEET,
    )
}

/// Escapes text for element content and quoted attribute values.
fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_text(response: Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("utf-8")
    }

    fn views() -> Views {
        Views::new(&Routes::new("/_gateway", "https://gw.example.com"))
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
    }

    #[tokio::test]
    async fn error_page_renders_all_parts() {
        let page = ErrorPage::bad_request("<b>bad</b>")
            .with_note("check settings")
            .with_button(Button::new("Back to login", "/_gateway/login"));
        let response = views().error_page(&page);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let html = body_text(response).await;
        assert!(html.contains("Bad Request: 400"));
        assert!(html.contains("&lt;b&gt;bad&lt;/b&gt;"));
        assert!(html.contains("check settings"));
        assert!(html.contains(r#"href="/_gateway/login""#));
        assert!(html.contains("/_gateway/static/style.css"));
    }

    #[tokio::test]
    async fn not_found_lists_gateway_endpoints() {
        let response = views().not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let html = body_text(response).await;
        assert!(html.contains("/_gateway/login"));
        assert!(html.contains("/_gateway/logout"));
        assert!(html.contains("/_gateway/health"));
    }
}
