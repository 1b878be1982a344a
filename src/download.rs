use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("server returned status {0}")]
    Status(StatusCode),
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Download one image and replace `dest` with it.
///
/// The body streams into a temporary file next to `dest`, which is renamed
/// over the original only once the transfer succeeds. A failed request or a
/// non-success status leaves the existing local file untouched.
pub fn fetch_image(client: &Client, url: &Url, dest: &Path) -> Result<u64, DownloadError> {
    log::info!("Downloading {} to {}", url, dest.display());

    let mut response = client
        .get(url.clone())
        .send()
        .map_err(DownloadError::Request)?;

    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }

    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut staging = NamedTempFile::new_in(parent).map_err(|source| DownloadError::Write {
        path: dest.to_path_buf(),
        source,
    })?;

    let bytes = response
        .copy_to(&mut staging)
        .map_err(DownloadError::Request)?;

    staging.persist(dest).map_err(|err| DownloadError::Write {
        path: dest.to_path_buf(),
        source: err.error,
    })?;

    log::info!("Download completed: {} bytes", bytes);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve a single canned HTTP response on a random local port.
    fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 2048];
                let _ = stream.read(&mut request);
                let _ = write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status_line,
                    body.len()
                );
                let _ = stream.write_all(body);
            }
        });
        format!("http://{}/img/logo.png", addr)
    }

    #[test]
    fn writes_the_body_over_the_placeholder() {
        let url = Url::parse(&serve_once("200 OK", b"fake image bytes")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("logo.png");
        fs::write(&dest, b"").unwrap();

        let client = Client::new();
        let bytes = fetch_image(&client, &url, &dest).unwrap();

        assert_eq!(bytes, 16);
        assert_eq!(fs::read(&dest).unwrap(), b"fake image bytes");
    }

    #[test]
    fn error_status_keeps_the_local_file() {
        let url = Url::parse(&serve_once("404 Not Found", b"")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("logo.png");
        fs::write(&dest, b"placeholder").unwrap();

        let client = Client::new();
        let err = fetch_image(&client, &url, &dest).unwrap_err();

        assert!(matches!(err, DownloadError::Status(status) if status.as_u16() == 404));
        assert_eq!(fs::read(&dest).unwrap(), b"placeholder");
    }
}
