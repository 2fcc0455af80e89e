//! Backend URL construction. Path segments are percent-encoded.

use crate::domain::DomainError;
use reqwest::Url;

pub fn parse_backend_url(backend_url: &str) -> Result<Url, DomainError> {
    let url = Url::parse(backend_url)
        .map_err(|e| DomainError::Validation(format!("invalid backend url '{}': {}", backend_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(DomainError::Validation(format!(
            "backend url '{}' cannot carry a path",
            backend_url
        )));
    }
    Ok(url)
}

/// Appends `segments` to the base path, e.g. `["chats", "7"]` -> `/chats/7`.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// `{backend}/ws/chat/{course_id}` with `http` -> `ws` and `https` -> `wss`.
pub fn chat_socket_url(backend_url: &str, course_id: &str) -> Result<String, DomainError> {
    let base = parse_backend_url(backend_url)?;
    let mut url = endpoint(&base, &["ws", "chat", course_id]);
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(DomainError::Validation(format!(
                "unsupported backend scheme '{}'",
                other
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| DomainError::Validation(format!("cannot switch scheme to {}", scheme)))?;
    Ok(url.to_string())
}
