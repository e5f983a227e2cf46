use percent_encoding::percent_decode_str;
use url::Url;

/// Prefix of the short storage notation, `gs://container/path`.
pub const STORAGE_SCHEME: &str = "gs://";

/// Container and object path of an uploaded proof document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    pub container: String,
    pub path: String,
}

impl DocumentReference {
    /// Only references naming both a container and an object are worth probing.
    pub fn is_usable(&self) -> bool {
        !self.container.is_empty() && !self.path.is_empty()
    }
}

/// Maps a user-supplied document locator to a blob store reference.
///
/// Accepts `gs://container/path` and download URLs of the form
/// `https://host/v0/b/<container>/o/<percent-encoded path>`. Anything else, including
/// malformed URLs, yields `None`; a missing document is an audit outcome, not an error.
pub fn resolve_document_reference(locator: &str) -> Option<DocumentReference> {
    if locator.is_empty() {
        return None;
    }

    if let Some(rest) = locator.strip_prefix(STORAGE_SCHEME) {
        return Some(from_storage_scheme(rest));
    }

    from_download_url(locator)
}

fn from_storage_scheme(rest: &str) -> DocumentReference {
    let (container, path) = rest.split_once('/').unwrap_or((rest, ""));
    DocumentReference {
        container: container.to_string(),
        path: path.to_string(),
    }
}

fn from_download_url(locator: &str) -> Option<DocumentReference> {
    let url = Url::parse(locator).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();

    let container = segment_after(&segments, "b")?;
    let encoded_path = segment_after(&segments, "o")?;
    let path = percent_decode_str(encoded_path).decode_utf8().ok()?;

    Some(DocumentReference {
        container: container.to_string(),
        path: path.into_owned(),
    })
}

fn segment_after<'a>(segments: &[&'a str], marker: &str) -> Option<&'a str> {
    let index = segments.iter().position(|segment| *segment == marker)?;
    segments.get(index + 1).copied()
}
