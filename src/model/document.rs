//! Document identity helpers

use lsp_types::Uri;

/// The scheme component of a URI (`file` for `file:///a.rs`)
pub fn uri_scheme(uri: &Uri) -> Option<&str> {
    uri.as_str().split_once(':').map(|(scheme, _)| scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_scheme() {
        let uri: Uri = "file:///tmp/project/src/main.rs".parse().unwrap();
        assert_eq!(uri_scheme(&uri), Some("file"));
    }

    #[test]
    fn test_virtual_scheme() {
        let uri: Uri = "libsyntax-rust://syntaxtree".parse().unwrap();
        assert_eq!(uri_scheme(&uri), Some("libsyntax-rust"));
    }
}
