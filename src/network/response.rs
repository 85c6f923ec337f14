use crate::prelude::*;
use std::borrow::Cow;

const NOT_FOUND: &str = "<html><head><title>404 Not Found</title></head>\
<body><h1>Not Found</h1><p>The requested URL was not found on this server.</p></body></html>\n";

#[derive(Debug)]
pub enum Response {
    Page(String),
    File { content_type: &'static str, body: Vec<u8> },
    NotFound,
    ServerError(io::ErrorKind),
    BadRequest,
}

impl Response {
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            Self::Page(_) | Self::File { .. } => (200, "OK"),
            Self::NotFound => (404, "Not Found"),
            Self::ServerError(_) => (500, "Internal Server Error"),
            Self::BadRequest => (400, "Bad Request"),
        }
    }

    /// The whole response as sent. Every connection is closed after one
    /// response, and `head_only` answers a `HEAD` request.
    pub fn encode(&self, head_only: bool) -> Vec<u8> {
        let (content_type, body) = match self {
            Self::Page(html) => ("text/html; charset=utf-8", Cow::Borrowed(html.as_bytes())),
            Self::File { content_type, body } => (*content_type, Cow::Borrowed(body.as_slice())),
            Self::NotFound => ("text/html; charset=utf-8", Cow::Borrowed(NOT_FOUND.as_bytes())),
            Self::ServerError(kind) => {
                let message = format!("Sorry, check with the site admin for error: {kind:?} ..\n");
                ("text/plain; charset=utf-8", Cow::Owned(message.into_bytes()))
            }
            Self::BadRequest => ("text/plain; charset=utf-8", Cow::Borrowed(&b"Bad request\n"[..])),
        };
        let (code, reason) = self.status();
        let mut out = format!(
            concat!(
                "HTTP/1.1 {} {}\r\n",
                "Content-Type: {}\r\n",
                "Content-Length: {}\r\n",
                "Cache-Control: no-cache\r\n",
                "Connection: close\r\n\r\n",
            ),
            code,
            reason,
            content_type,
            body.len()
        )
        .into_bytes();
        if !head_only {
            out.extend_from_slice(&body);
        }
        out
    }
}

/// Content type for a file the renderer produced, by extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}
