use std::path::PathBuf;

use url::Url;

pub const URI_SCHEME_FILE: &str = "file://";

/// Convert a `file://` URI to a filesystem path.
///
/// `file:///abs/path` and `file://localhost/abs/path` are parsed as URLs so
/// percent-escapes are decoded. Anything else after the scheme
/// (`file://flows/main.json`) is taken as a relative path, verbatim.
pub fn url_to_file_path(uri: &str) -> Result<PathBuf, String> {
    let rest = uri
        .strip_prefix(URI_SCHEME_FILE)
        .ok_or_else(|| format!("`{}` is not a file URI", uri))?;

    if rest.starts_with('/') || rest.starts_with("localhost/") {
        let url = Url::parse(uri).map_err(|e| format!("invalid file URI `{}`: {}", uri, e))?;
        return url
            .to_file_path()
            .map_err(|_| format!("file URI `{}` has no local path", uri));
    }
    if rest.is_empty() {
        return Err(format!("file URI `{}` has an empty path", uri));
    }
    Ok(PathBuf::from(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_absolute_file_uri() {
        assert_eq!(
            url_to_file_path("file:///tmp/flows/main.json").unwrap(),
            PathBuf::from("/tmp/flows/main.json")
        );
        assert_eq!(
            url_to_file_path("file:///tmp/my%20flows/a.json").unwrap(),
            PathBuf::from("/tmp/my flows/a.json")
        );
        assert_eq!(
            url_to_file_path("file://localhost/tmp/a.json").unwrap(),
            PathBuf::from("/tmp/a.json")
        );
    }

    #[test]
    fn test_relative_file_uri() {
        assert_eq!(
            url_to_file_path("file://flows/main.json").unwrap(),
            PathBuf::from("flows/main.json")
        );
    }

    #[test]
    fn test_rejects_other_schemes_and_empty_paths() {
        assert!(url_to_file_path("http://example.com/flow").is_err());
        assert!(url_to_file_path("file://").is_err());
    }
}
