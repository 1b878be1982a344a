use reqwest::Url;
use std::path::{Component, Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid remote URL '{text}': {reason}")]
    InvalidBase { text: String, reason: String },
    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("cannot join '{relative}' onto {base}: {reason}")]
    Join {
        base: Url,
        relative: String,
        reason: String,
    },
}

/// Parse the remote demo URL typed into the window.
pub fn validate_base(text: &str) -> Result<Url, RemoteError> {
    let trimmed = text.trim();
    let url = Url::parse(trimmed).map_err(|err| RemoteError::InvalidBase {
        text: trimmed.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RemoteError::UnsupportedScheme(other.to_string())),
    }
}

/// Map a path relative to the template root onto the remote base.
///
/// The base always contributes its full path: a missing trailing slash is
/// added before joining so `https://demo.site/theme` + `img/logo.png` becomes
/// `https://demo.site/theme/img/logo.png` rather than dropping `theme`.
/// Separators are normalised to `/` and segments are percent-encoded by the
/// URL parser.
pub fn remote_url_for(base: &Url, relative: &Path) -> Result<Url, RemoteError> {
    let relative = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
        .replace('\\', "/");

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(&relative).map_err(|err| RemoteError::Join {
        base,
        relative,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn accepts_http_and_https() {
        assert!(validate_base("http://demo.example.com").is_ok());
        assert!(validate_base(" https://demo.example.com/theme ").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert!(matches!(
            validate_base("ftp://demo.example.com"),
            Err(RemoteError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_base("not a url"),
            Err(RemoteError::InvalidBase { .. })
        ));
    }

    #[test]
    fn base_without_trailing_slash_keeps_its_last_segment() {
        let base = validate_base("https://demo.example.com/theme").unwrap();
        let url = remote_url_for(&base, &PathBuf::from("img/logo.png")).unwrap();
        assert_eq!(url.as_str(), "https://demo.example.com/theme/img/logo.png");
    }

    #[test]
    fn base_with_trailing_slash_joins_the_same_way() {
        let base = validate_base("https://demo.example.com/theme/").unwrap();
        let url = remote_url_for(&base, &PathBuf::from("img/logo.png")).unwrap();
        assert_eq!(url.as_str(), "https://demo.example.com/theme/img/logo.png");
    }

    #[test]
    fn nested_paths_and_spaces_are_encoded() {
        let base = validate_base("http://demo.example.com").unwrap();
        let url = remote_url_for(&base, &PathBuf::from("img/team/jane doe.jpg")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://demo.example.com/img/team/jane%20doe.jpg"
        );
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        let base = validate_base("http://demo.example.com").unwrap();
        let url = remote_url_for(&base, &PathBuf::from(r"img\logo.png")).unwrap();
        assert_eq!(url.as_str(), "http://demo.example.com/img/logo.png");
    }
}
