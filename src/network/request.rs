use super::wire;

/// Largest request head accepted before the connection is refused.
pub const MAX_HEAD: usize = 16 * 1024;
/// Largest body accepted. The list forms are a few hundred bytes.
pub const MAX_BODY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadRequest;

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// The target without its query string.
    pub fn path(&self) -> &str {
        self.target.split_once('?').map_or(&self.target, |(path, _)| path)
    }
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, value)| wire::cookies(value))
            .find_map(|(key, value)| (key == name).then_some(value))
    }
    pub fn form(&self) -> Vec<(String, String)> {
        wire::form_pairs(&self.body)
    }
}

/// Parses one request off the front of `buf`, returning it with the number of
/// bytes it took up. `Ok(None)` means more bytes are needed.
pub fn parse(buf: &[u8]) -> Result<Option<(Request, usize)>, BadRequest> {
    let Some(end) = wire::head_end(buf) else {
        return if buf.len() > MAX_HEAD { Err(BadRequest) } else { Ok(None) };
    };
    if end > MAX_HEAD {
        return Err(BadRequest);
    }
    let head = core::str::from_utf8(&buf[..end]).map_err(|_| BadRequest)?;
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().ok_or(BadRequest)?.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (request_line.next(), request_line.next(), request_line.next(), request_line.next())
    else {
        return Err(BadRequest);
    };
    if !version.starts_with("HTTP/1.") || !target.starts_with('/') {
        return Err(BadRequest);
    }
    let method = match method {
        "GET" => Method::Get,
        "HEAD" => Method::Head,
        "POST" => Method::Post,
        _ => Method::Other,
    };

    let mut headers = vec![];
    for line in lines {
        let (key, value) = line.split_once(':').ok_or(BadRequest)?;
        headers.push((key.trim().to_owned(), value.trim().to_owned()));
    }
    let mut request = Request { method, target: target.to_owned(), headers, body: vec![] };
    if request.header("transfer-encoding").is_some() {
        return Err(BadRequest);
    }
    let length = match request.header("content-length") {
        None => 0,
        Some(len) => len.parse::<usize>().map_err(|_| BadRequest)?,
    };
    if length > MAX_BODY {
        return Err(BadRequest);
    }
    let body_start = end + 4;
    let Some(body) = buf.get(body_start..body_start + length) else {
        return Ok(None);
    };
    request.body = body.to_vec();
    Ok(Some((request, body_start + length)))
}
