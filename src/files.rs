//! Read only access to the served directory.
//!
//! The directory is accessed through a [PhysicalFS] wrapped into a [VfsPath], so every lookup
//! stays inside the root directory. File content is streamed in chunks. Single byte ranges and
//! conditional requests (`If-None-Match`, `If-Modified-Since`, `If-Range`) are supported.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::SystemTime;

use async_stream::try_stream;
use hyper::header::{
    HeaderName, HeaderValue, ACCEPT_RANGES, ALLOW, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE,
    ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, LAST_MODIFIED, LOCATION, RANGE,
};
use hyper::{Body, HeaderMap, Method, Response, StatusCode};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::warn;
use vfs::{PhysicalFS, SeekAndRead, VfsFileType, VfsMetadata, VfsPath};

const INDEX_FILE: &str = "index.html";

/// Size of the chunks a file body is read in
const CHUNK_SIZE: usize = 64 * 1024;

/// Characters escaped in the links of a directory listing
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

type FileReader = Box<dyn SeekAndRead + Send>;

/// Serves files and directory listings below a root directory.
#[derive(Clone)]
pub struct StaticFiles {
    root: VfsPath,
}

impl StaticFiles {
    /// Exposes the content of `root`.
    pub fn new(root: &Path) -> Self {
        StaticFiles {
            root: VfsPath::new(PhysicalFS::new(root.to_path_buf())),
        }
    }

    /// Answers a request for `path`, which is the (percent encoded) path of the request uri.
    /// `headers` are the request headers, used for range and conditional requests.
    ///
    /// This method does blocking file IO. The body of a file is read later, while it is sent.
    pub fn respond(&self, method: &Method, path: &str, headers: &HeaderMap) -> Response<Body> {
        if method != Method::GET && method != Method::HEAD {
            let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        let segments = match segments(path) {
            Some(segments) => segments,
            None => return text(StatusCode::BAD_REQUEST, "invalid URL path"),
        };
        let target = match self.resolve(&segments) {
            Some(target) => target,
            None => return not_found(),
        };
        let metadata = match target.metadata() {
            Ok(metadata) => metadata,
            Err(_) => return not_found(),
        };
        let trailing_slash = path.ends_with('/');
        let name = segments.last().map(String::as_str).unwrap_or("");

        let response = match metadata.file_type {
            VfsFileType::Directory => {
                if !trailing_slash {
                    return redirect(&format!("{}/", escape_href(name)));
                }
                let index = target
                    .join(INDEX_FILE)
                    .ok()
                    .and_then(|index| index.metadata().ok().map(|meta| (index, meta)));
                match index {
                    Some((index, meta)) if matches!(meta.file_type, VfsFileType::File) => {
                        file(&index, &meta, headers)
                    }
                    _ => listing(&target),
                }
            }
            VfsFileType::File => {
                if trailing_slash {
                    return redirect(&format!("../{}", escape_href(name)));
                }
                file(&target, &metadata, headers)
            }
        };

        if method == Method::HEAD {
            let (parts, _) = response.into_parts();
            return Response::from_parts(parts, Body::empty());
        }
        response
    }

    fn resolve(&self, segments: &[String]) -> Option<VfsPath> {
        if segments.is_empty() {
            return Some(self.root.clone());
        }
        self.root.join(&segments.join("/")).ok()
    }
}

/// Splits the request path into decoded segments.
///
/// Empty segments and `.` are dropped. Returns `None` for `..` or undecodable segments.
fn segments(path: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        let segment = percent_decode_str(segment).decode_utf8().ok()?;
        match segment.as_ref() {
            "" | "." => {}
            ".." => return None,
            s if s.contains('/') || s.contains('\\') || s.contains('\0') => return None,
            s => segments.push(s.to_string()),
        }
    }
    Some(segments)
}

fn file(path: &VfsPath, metadata: &VfsMetadata, request: &HeaderMap) -> Response<Body> {
    let size = metadata.len;
    let etag = etag(size, metadata.modified);

    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        headers.insert(ETAG, value);
    }
    if let Some(modified) = metadata.modified {
        if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
            headers.insert(LAST_MODIFIED, value);
        }
    }

    if not_modified(request, &etag, metadata.modified) {
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        return response;
    }

    let mime = mime_guess::from_path(path.as_str()).first_or_octet_stream();
    if let Ok(value) = mime.as_ref().parse() {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }

    let range = match header_str(request, RANGE) {
        Some(range) if if_range_matches(request, metadata.modified) => parse_range(range, size),
        _ => Ok(None),
    };
    let (start, len) = match range {
        Ok(None) => (0, size),
        Ok(Some(range)) => {
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            let content_range = format!("bytes {}-{}/{}", range.start, range.end, size);
            if let Ok(value) = HeaderValue::from_str(&content_range) {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
            (range.start, range.len())
        }
        Err(Unsatisfiable) => {
            let mut response = text(StatusCode::RANGE_NOT_SATISFIABLE, "invalid range");
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(CONTENT_RANGE, value);
            }
            return response;
        }
    };

    let reader = path
        .open_file()
        .map_err(|e| e.to_string())
        .and_then(|mut f| {
            f.seek(SeekFrom::Start(start))
                .map(|_| f)
                .map_err(|e| e.to_string())
        });
    let reader = match reader {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Failed to read {}: {}", path.as_str(), e);
            return internal_error();
        }
    };

    response.headers_mut().insert(CONTENT_LENGTH, len.into());
    *response.body_mut() = chunked(reader, len);
    response
}

/// Streams `len` bytes of `reader`, reading one chunk at a time on the blocking pool.
fn chunked(reader: FileReader, len: u64) -> Body {
    let stream = try_stream! {
        let mut reader = reader;
        let mut remaining = len;
        while remaining > 0 {
            let want = remaining.min(CHUNK_SIZE as u64) as usize;
            let (returned, chunk) = read_chunk(reader, want).await?;
            reader = returned;
            remaining -= chunk.len() as u64;
            yield chunk;
        }
    };
    Body::wrap_stream::<_, Vec<u8>, io::Error>(stream)
}

async fn read_chunk(reader: FileReader, want: usize) -> io::Result<(FileReader, Vec<u8>)> {
    let (reader, chunk) = tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        let mut chunk = vec![0; want];
        let res = reader.read(&mut chunk).map(|n| {
            chunk.truncate(n);
            chunk
        });
        (reader, res)
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let chunk = chunk?;
    if chunk.is_empty() {
        // the file was truncated after its length was sent
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "file ended before its announced length",
        ));
    }
    Ok((reader, chunk))
}

/// Weak validator built from size and modification time.
fn etag(size: u64, modified: Option<SystemTime>) -> String {
    let mtime = modified
        .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("W/\"{:x}-{:x}\"", size, mtime)
}

/// Whether a conditional GET can be answered with 304. `If-None-Match` takes precedence over
/// `If-Modified-Since`.
fn not_modified(request: &HeaderMap, etag: &str, modified: Option<SystemTime>) -> bool {
    if let Some(candidates) = header_str(request, IF_NONE_MATCH) {
        return etag_matches(etag, candidates);
    }
    match (header_str(request, IF_MODIFIED_SINCE), modified) {
        (Some(since), Some(modified)) => match httpdate::parse_http_date(since) {
            Ok(since) => !newer(modified, since),
            Err(_) => false,
        },
        _ => false,
    }
}

/// Weak comparison against a list of entity tags.
fn etag_matches(etag: &str, candidates: &str) -> bool {
    if candidates.trim() == "*" {
        return true;
    }
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    candidates.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

/// A range is only honoured if `If-Range` is absent or names the current modification date.
/// Entity tags never match, since the served ones are weak.
fn if_range_matches(request: &HeaderMap, modified: Option<SystemTime>) -> bool {
    let value = match request.get(IF_RANGE) {
        Some(value) => value,
        None => return true,
    };
    let date = value
        .to_str()
        .ok()
        .and_then(|value| httpdate::parse_http_date(value).ok());
    match (date, modified) {
        (Some(date), Some(modified)) => !newer(modified, date) && !newer(date, modified),
        _ => false,
    }
}

/// HTTP dates have a resolution of one second.
fn newer(time: SystemTime, than: SystemTime) -> bool {
    matches!(time.duration_since(than), Ok(delta) if delta.as_secs() >= 1)
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<&str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Inclusive byte range of a file
#[derive(Debug, PartialEq, Eq)]
struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// A `Range` header which can not be served from the file.
#[derive(Debug, PartialEq, Eq)]
struct Unsatisfiable;

/// Parses a `Range` header against a file of `size` bytes.
///
/// Returns `Ok(None)` for headers which are ignored: other units than bytes, and multiple
/// ranges, which get the whole file. The end of a range is clamped to the file size.
fn parse_range(header: &str, size: u64) -> Result<Option<ByteRange>, Unsatisfiable> {
    let spec = match header.trim().strip_prefix("bytes=") {
        Some(spec) if !spec.contains(',') => spec.trim(),
        _ => return Ok(None),
    };
    let (start, end) = spec.split_once('-').ok_or(Unsatisfiable)?;
    let (start, end) = (start.trim(), end.trim());
    if size == 0 {
        return Err(Unsatisfiable);
    }

    if start.is_empty() {
        // suffix range, the last `end` bytes
        let suffix: u64 = end.parse().map_err(|_| Unsatisfiable)?;
        if suffix == 0 {
            return Err(Unsatisfiable);
        }
        return Ok(Some(ByteRange {
            start: size.saturating_sub(suffix),
            end: size - 1,
        }));
    }

    let start: u64 = start.parse().map_err(|_| Unsatisfiable)?;
    if start >= size {
        return Err(Unsatisfiable);
    }
    let end = if end.is_empty() {
        size - 1
    } else {
        let end: u64 = end.parse().map_err(|_| Unsatisfiable)?;
        if end < start {
            return Err(Unsatisfiable);
        }
        end.min(size - 1)
    };
    Ok(Some(ByteRange { start, end }))
}

fn listing(dir: &VfsPath) -> Response<Body> {
    let entries = match dir.read_dir() {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list {}: {}", dir.as_str(), e);
            return text(StatusCode::INTERNAL_SERVER_ERROR, "Error reading directory");
        }
    };
    let mut names: Vec<String> = entries
        .map(|entry| {
            let mut name = entry.filename();
            if matches!(entry.metadata(), Ok(meta) if matches!(meta.file_type, VfsFileType::Directory)) {
                name.push('/');
            }
            name
        })
        .collect();
    names.sort();

    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for name in names {
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>\n",
            escape_href(&name),
            escape_html(&name)
        ));
    }
    html.push_str("</pre>\n");

    let mut response = Response::new(Body::from(html));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

/// Percent encodes a relative link. A colon in the first segment would turn the link into an
/// absolute URL with a scheme, so such links start with `./`.
fn escape_href(name: &str) -> String {
    let href = utf8_percent_encode(name, HREF).to_string();
    match href.split('/').next() {
        Some(first) if first.contains(':') => format!("./{}", href),
        _ => href,
    }
}

fn escape_html(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn redirect(location: &str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    if let Ok(value) = location.parse() {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

/// Response for requests which failed because of the server.
pub(crate) fn internal_error() -> Response<Body> {
    text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

fn not_found() -> Response<Body> {
    text(StatusCode::NOT_FOUND, "404 page not found")
}

fn text(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(format!("{}\n", message)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
