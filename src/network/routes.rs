use crate::prelude::*;
use super::request::{Method, Request};
use super::wire;
use super::{response, Response, Ticket};
use crate::access::Viewer;
use crate::frontend::{Action, Frontend};

/// Icon the game keeps next to each world, served as its thumbnail.
pub const WORLD_ICON: &str = "world_icon.jpeg";

#[derive(Debug)]
pub(super) enum Routed {
    Reply(Response),
    /// A render was started; the page follows once it is done.
    Pending,
}

pub(super) fn route(
    frontend: &mut Frontend<Ticket>,
    viewer: Viewer,
    request: &Request,
    ticket: Ticket,
) -> Routed {
    log::debug!("{:?} {} as {viewer:?}", request.method, request.target);
    match request.method {
        Method::Post => {
            let fields = request.form();
            let pairs = fields.iter().map(|(k, v)| (k.as_str(), v.as_str()));
            let (action, scroll) = Action::from_form(pairs);
            match frontend.perform(viewer, action, scroll, ticket) {
                Some(html) => Routed::Reply(Response::Page(html)),
                None => Routed::Pending,
            }
        }
        Method::Get | Method::Head => Routed::Reply(get(frontend, viewer, request.path())),
        Method::Other => Routed::Reply(Response::BadRequest),
    }
}

/// The decoded segments of `path`, or `None` if any of them could climb out
/// of the directory it is resolved against.
fn segments(path: &str) -> Option<Vec<String>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| wire::percent_decode(s, false))
        .map(|s| {
            let climbs = s == "." || s == ".." || s.contains(|c| matches!(c, '/' | '\\' | '\0'));
            (!climbs).then_some(s)
        })
        .collect()
}

fn get(frontend: &mut Frontend<Ticket>, viewer: Viewer, path: &str) -> Response {
    if path == "/" || path == "/index.html" {
        return Response::Page(frontend.list(viewer, None, 0));
    }
    let Some(decoded) = segments(path) else {
        log::warn!("refusing path {path:?}");
        return Response::NotFound;
    };
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
    let config = frontend.config();
    let file = match segments.as_slice() {
        ["thumbnails", icon] => match icon.strip_suffix(".jpg") {
            Some(id) if frontend.may_serve(viewer, id) => {
                config.worlds_root.join(id).join(WORLD_ICON)
            }
            _ => return Response::NotFound,
        },
        [map, ..] if frontend.may_serve(viewer, map) => {
            segments.iter().fold(config.maps_root.clone(), |file, segment| file.join(segment))
        }
        _ => return Response::NotFound,
    };
    serve_file(&file)
}

fn serve_file(path: &Path) -> Response {
    if path.is_dir() {
        return Response::NotFound;
    }
    match fs::read(path) {
        Ok(body) => Response::File { content_type: response::content_type(path), body },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Response::NotFound,
        Err(e) => {
            log::error!("unable to read {}: {e}", path.display());
            Response::ServerError(e.kind())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_decodes_paths() {
        assert_eq!(segments("/m1//js/app%20v2.js").unwrap(), ["m1", "js", "app v2.js"]);
        assert_eq!(segments("/").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn refuses_to_climb() {
        let paths = ["/../etc/passwd", "/m1/../../x", "/m1/%2e%2e/x", "/m1/a%2Fb", "/m1/a%5Cb"];
        for path in paths.into_iter().chain(["/./m1"]) {
            assert!(segments(path).is_none(), "{path}");
        }
    }
}
