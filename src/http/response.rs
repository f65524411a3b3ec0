use std::path::{Path, PathBuf};

use crate::http::request::Request;
use crate::http::resource::{FileSystem, ResolvedResource};

/// Protocol the reply is framed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Legacy simple response: entity bytes only.
    Http09,
    Http10,
}

impl ProtocolVersion {
    /// Picks the reply framing for a request. Only a request without a version
    /// token gets the simple form; every full request is answered as 1.0.
    pub fn negotiate(request: &Request) -> Self {
        if request.is_simple() {
            ProtocolVersion::Http09
        } else {
            ProtocolVersion::Http10
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::Http09 => "HTTP/0.9",
            ProtocolVersion::Http10 => "HTTP/1.0",
        }
    }
}

/// HTTP status codes the server can answer with.
///
/// - `Ok` (200): the resource exists and is readable
/// - `NotFound` (404): anything else, including URIs with no usable path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 404 Not Found
    NotFound,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use beacon::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotFound => 404,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "Not Found",
        }
    }
}

/// What will be streamed after the headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub path: PathBuf,
    pub content_type: &'static str,
    /// File size when the response was built; the stream must match it.
    pub content_length: u64,
}

/// A response ready to be serialized. Consumed once by the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: ProtocolVersion,
    pub status: StatusCode,
    pub entity: Option<Entity>,
}

/// Builder for constructing responses in a fluent style.
///
/// An entity is only kept for a 200; a 404 never carries one.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(ProtocolVersion::Http10)
///     .status(StatusCode::Ok)
///     .entity("site/a.css", "text/css", 42)
///     .build();
/// ```
pub struct ResponseBuilder {
    version: ProtocolVersion,
    status: StatusCode,
    entity: Option<Entity>,
}

impl ResponseBuilder {
    pub fn new(version: ProtocolVersion) -> Self {
        Self {
            version,
            status: StatusCode::NotFound,
            entity: None,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn entity(
        mut self,
        path: impl Into<PathBuf>,
        content_type: &'static str,
        content_length: u64,
    ) -> Self {
        self.entity = Some(Entity {
            path: path.into(),
            content_type,
            content_length,
        });
        self
    }

    pub fn build(self) -> Response {
        let entity = match self.status {
            StatusCode::Ok => self.entity,
            StatusCode::NotFound => None,
        };

        Response {
            version: self.version,
            status: self.status,
            entity,
        }
    }
}

impl Response {
    /// Determines status and entity headers for a resolved resource.
    ///
    /// A resource whose size cannot be read any more is answered with 404;
    /// nothing has been promised to the client yet at this point.
    pub async fn for_resource(
        version: ProtocolVersion,
        resource: &ResolvedResource,
        fs: &dyn FileSystem,
    ) -> Self {
        let builder = ResponseBuilder::new(version);

        let ResolvedResource::Found { path, mime_type } = resource else {
            return builder.status(StatusCode::NotFound).build();
        };

        match fs.file_size(path).await {
            Ok(size) => builder
                .status(StatusCode::Ok)
                .entity(path.clone(), *mime_type, size)
                .build(),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "resource vanished before sizing");
                builder.status(StatusCode::NotFound).build()
            }
        }
    }

    /// Creates a 404 Not Found response.
    pub fn not_found(version: ProtocolVersion) -> Self {
        ResponseBuilder::new(version)
            .status(StatusCode::NotFound)
            .build()
    }

    /// Entity headers in wire order. Empty for a 404.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        match &self.entity {
            Some(entity) => vec![
                ("Content-Type", entity.content_type.to_string()),
                ("Content-Length", entity.content_length.to_string()),
            ],
            None => Vec::new(),
        }
    }

    pub fn entity_path(&self) -> Option<&Path> {
        self.entity.as_ref().map(|e| e.path.as_path())
    }
}
