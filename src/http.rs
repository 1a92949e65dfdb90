//! Request line parsing, routing table and response headers

use crate::buffer::{BoundedWriter, Overflow};

pub const HTTP_PORT: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    pub fn classify(request: &[u8]) -> Self {
        if request.starts_with(b"GET ") {
            Method::Get
        } else if request.starts_with(b"POST ") {
            Method::Post
        } else {
            Method::Other
        }
    }
}

/// Path and query of a request line, borrowed from the header buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    pub path: &'a str,
    /// `None` when there is no `?` or nothing follows it.
    pub query: Option<&'a str>,
}

/// Extract the request target from `METHOD SP target SP version`.
///
/// The header buffer may have been cut short, so a missing version is fine.
/// Returns `None` for a target that is not valid UTF-8.
pub fn parse_target(request: &[u8]) -> Option<Target<'_>> {
    let start = request.iter().position(|&b| b == b' ')? + 1;
    let rest = &request[start..];
    let end = rest
        .iter()
        .position(|&b| matches!(b, b' ' | b'\r' | b'\n'))
        .unwrap_or(rest.len());
    let target = core::str::from_utf8(&rest[..end]).ok()?;
    let (path, query) = match target.split_once('?') {
        Some((path, "")) => (path, None),
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    Some(Target { path, query })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Style,
    StyleInfo,
    Favicon,
    Info,
    Settings,
    SetParams,
    Advanced,
    SetAdvParams,
    SetHighTemp,
    SetHighTempForm,
    SetLowTemp,
    SetLowTempForm,
    SetHighHum,
    SetHighHumForm,
    SetLowHum,
    SetLowHumForm,
    ApiInfo,
    ApiSettings,
    ApiSetParams,
    ApiSetAdvParams,
    ApiSetHighTemp,
    ApiSetLowTemp,
    ApiSetHighHum,
    ApiSetLowHum,
}

const ROUTES: [(&str, Route); 24] = [
    ("/style.css", Route::Style),
    ("/style_info.css", Route::StyleInfo),
    ("/favicon.ico", Route::Favicon),
    ("/info", Route::Info),
    ("/settings", Route::Settings),
    ("/setparams", Route::SetParams),
    ("/advparams", Route::Advanced),
    ("/setadvparams", Route::SetAdvParams),
    ("/sethightemp", Route::SetHighTemp),
    ("/sethightempform", Route::SetHighTempForm),
    ("/setlowtemp", Route::SetLowTemp),
    ("/setlowtempform", Route::SetLowTempForm),
    ("/sethighhum", Route::SetHighHum),
    ("/sethighhumform", Route::SetHighHumForm),
    ("/setlowhum", Route::SetLowHum),
    ("/setlowhumform", Route::SetLowHumForm),
    ("/api/v1/info", Route::ApiInfo),
    ("/api/v1/settings", Route::ApiSettings),
    ("/api/v1/setparams", Route::ApiSetParams),
    ("/api/v1/setadvparams", Route::ApiSetAdvParams),
    ("/api/v1/sethightemp", Route::ApiSetHighTemp),
    ("/api/v1/setlowtemp", Route::ApiSetLowTemp),
    ("/api/v1/sethighhum", Route::ApiSetHighHum),
    ("/api/v1/setlowhum", Route::ApiSetLowHum),
];

impl Route {
    /// Exact path match; `/sethightemp` never shadows `/sethightempform`.
    pub fn resolve(path: &str) -> Option<Self> {
        ROUTES.iter().find(|(p, _)| *p == path).map(|(_, r)| *r)
    }

    pub fn path(self) -> &'static str {
        ROUTES
            .iter()
            .find(|(_, r)| *r == self)
            .map(|(p, _)| *p)
            .unwrap_or("/")
    }

    pub fn all() -> impl Iterator<Item = Route> {
        ROUTES.iter().map(|(_, r)| *r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Css,
    Icon,
    Json,
}

impl ContentType {
    /// Classify by the request path alone, independently of routing.
    pub fn from_path(path: &str) -> Self {
        if path.contains(".css") {
            ContentType::Css
        } else if path.contains(".ico") {
            ContentType::Icon
        } else if path.contains("/api/") {
            ContentType::Json
        } else {
            ContentType::Html
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ContentType::Html => "text/html; charset=utf-8",
            ContentType::Css => "text/css; charset=utf-8",
            ContentType::Icon => "image/x-icon",
            ContentType::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotFound,
    InternalServerError,
    NotImplemented,
}

impl Status {
    pub const fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
            Status::NotImplemented => 501,
        }
    }

    pub const fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
            Status::NotImplemented => "Not Implemented",
        }
    }
}

pub fn write_ok_header(
    out: &mut BoundedWriter<'_>,
    content_type: ContentType,
    body_len: usize,
) -> Result<(), Overflow> {
    out.push_fmt(format_args!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
        body_len,
        content_type.as_str()
    ))
}

/// Header of a body-less error response.
pub fn write_error_header(out: &mut BoundedWriter<'_>, status: Status) -> Result<(), Overflow> {
    out.push_fmt(format_args!(
        "HTTP/1.1 {} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status.code(),
        status.reason()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods() {
        assert_eq!(Method::classify(b"GET /info HTTP/1.1"), Method::Get);
        assert_eq!(Method::classify(b"POST /setparams HTTP/1.1"), Method::Post);
        assert_eq!(Method::classify(b"PUT /info HTTP/1.1"), Method::Other);
        assert_eq!(Method::classify(b"GETX /info"), Method::Other);
        assert_eq!(Method::classify(b""), Method::Other);
    }

    #[test]
    fn target_split() {
        let t = parse_target(b"GET /setadvparams?ptime=10 HTTP/1.1\r\nHost: x\r\n").unwrap();
        assert_eq!(t.path, "/setadvparams");
        assert_eq!(t.query, Some("ptime=10"));

        let t = parse_target(b"GET /info HTTP/1.1").unwrap();
        assert_eq!(t, Target { path: "/info", query: None });

        let t = parse_target(b"GET /settings?").unwrap();
        assert_eq!(t.query, None);

        // Cut off by the header buffer.
        let t = parse_target(b"GET /setparams?ssid=ab").unwrap();
        assert_eq!(t.query, Some("ssid=ab"));

        assert_eq!(parse_target(b"GET"), None);
        assert_eq!(parse_target(b"GET /\xff HTTP/1.1"), None);
    }

    #[test]
    fn exact_routing() {
        assert_eq!(Route::resolve("/sethightemp"), Some(Route::SetHighTemp));
        assert_eq!(Route::resolve("/sethightempform"), Some(Route::SetHighTempForm));
        assert_eq!(Route::resolve("/api/v1/info"), Some(Route::ApiInfo));
        assert_eq!(Route::resolve("/info"), Some(Route::Info));
        assert_eq!(Route::resolve("/infox"), None);
        assert_eq!(Route::resolve("/"), None);
        assert_eq!(Route::resolve("/api/v1/"), None);
    }

    #[test]
    fn every_route_resolves_from_its_own_path() {
        assert_eq!(Route::all().count(), 24);
        for route in Route::all() {
            assert_eq!(Route::resolve(route.path()), Some(route));
        }
    }

    #[test]
    fn content_type_agrees_with_route() {
        for route in Route::all() {
            let expected = match route {
                Route::Style | Route::StyleInfo => ContentType::Css,
                Route::Favicon => ContentType::Icon,
                Route::ApiInfo
                | Route::ApiSettings
                | Route::ApiSetParams
                | Route::ApiSetAdvParams
                | Route::ApiSetHighTemp
                | Route::ApiSetLowTemp
                | Route::ApiSetHighHum
                | Route::ApiSetLowHum => ContentType::Json,
                _ => ContentType::Html,
            };
            assert_eq!(ContentType::from_path(route.path()), expected, "{:?}", route);
        }
    }

    #[test]
    fn header_blocks() {
        let mut buf = [0u8; 128];
        let mut w = BoundedWriter::new(&mut buf);
        write_ok_header(&mut w, ContentType::Json, 31).unwrap();
        assert_eq!(
            w.as_bytes(),
            b"HTTP/1.1 200 OK\r\nContent-Length: 31\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n"
        );

        w.clear();
        write_error_header(&mut w, Status::NotImplemented).unwrap();
        assert!(w.as_bytes().starts_with(b"HTTP/1.1 501 Not Implemented\r\n"));
        assert!(w.as_bytes().ends_with(b"Content-Length: 0\r\nConnection: close\r\n\r\n"));
    }

    #[test]
    fn largest_ok_header_fits_the_header_buffer() {
        let mut buf = [0u8; 128];
        let mut w = BoundedWriter::new(&mut buf);
        write_ok_header(&mut w, ContentType::Html, 99_999).unwrap();
    }
}
