use crate::mime;
use cachet_compress::Compression;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

/// What an asset is, as far as headers and rewriting are concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentKind {
    JavaScript,
    Css,
    /// Sourcemaps.
    Json,
    /// Anything the extension table recognises, carrying its media type.
    Other(&'static str),
    Binary,
}

impl ContentKind {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::JavaScript => "application/javascript",
            Self::Css => "text/css",
            Self::Json => "application/json",
            Self::Other(mime) => mime,
            Self::Binary => "application/octet-stream",
        }
    }

    /// Whether the body may contain references that point at other assets.
    pub fn is_rewritable(&self) -> bool {
        matches!(self, Self::JavaScript | Self::Css)
    }
}

impl Display for ContentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.mime())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Classification {
    pub kind: ContentKind,
    pub compression: Compression,
}

impl Classification {
    pub fn is_gzip(&self) -> bool {
        self.compression == Compression::Gzip
    }
}

/// Classify a file by its name alone. The first matching rule wins:
///
/// 1. `*.js`, `*.js.gz` are JavaScript.
/// 2. `*.css`, `*.css.gz` are stylesheets.
/// 3. `*.js.map`, `*.css.map` are JSON sourcemaps.
/// 4. The extension (ignoring a trailing `.gz`) is looked up in a static
///    media type table.
/// 5. Everything else is opaque binary.
///
/// Compression is decided independently: any name ending in `.gz` is gzip.
pub fn classify(path: impl AsRef<Path>) -> Classification {
    let path = path.as_ref();
    let compression = Compression::from_path(path);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let kind = if name.ends_with(".js") || name.ends_with(".js.gz") {
        ContentKind::JavaScript
    } else if name.ends_with(".css") || name.ends_with(".css.gz") {
        ContentKind::Css
    } else if name.ends_with(".js.map") || name.ends_with(".css.map") {
        ContentKind::Json
    } else {
        let stem = name.strip_suffix(".gz").unwrap_or(&name);
        stem.rsplit_once('.')
            .and_then(|(_, extension)| mime::lookup(extension))
            .map_or(ContentKind::Binary, ContentKind::Other)
    };

    Classification { kind, compression }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("app.js", ContentKind::JavaScript, Compression::None)]
    #[case("dist/app.min.js.gz", ContentKind::JavaScript, Compression::Gzip)]
    #[case("style.css", ContentKind::Css, Compression::None)]
    #[case("STYLE.CSS.GZ", ContentKind::Css, Compression::Gzip)]
    #[case("source.css.map", ContentKind::Json, Compression::None)]
    #[case("app.js.map", ContentKind::Json, Compression::None)]
    #[case("logo.png", ContentKind::Other("image/png"), Compression::None)]
    #[case("font.woff2.gz", ContentKind::Other("font/woff2"), Compression::Gzip)]
    #[case("archive.gz", ContentKind::Binary, Compression::Gzip)]
    #[case("README", ContentKind::Binary, Compression::None)]
    #[case("design.psd", ContentKind::Binary, Compression::None)]
    fn classification_table(#[case] name: &str, #[case] kind: ContentKind, #[case] compression: Compression) {
        assert_eq!(classify(name), Classification { kind, compression });
    }

    #[rstest]
    #[case(ContentKind::JavaScript, "application/javascript")]
    #[case(ContentKind::Css, "text/css")]
    #[case(ContentKind::Json, "application/json")]
    #[case(ContentKind::Binary, "application/octet-stream")]
    #[case(ContentKind::Other("image/gif"), "image/gif")]
    fn media_types(#[case] kind: ContentKind, #[case] expected: &str) {
        assert_eq!(kind.mime(), expected);
    }

    #[test]
    fn only_scripts_and_stylesheets_are_rewritable() {
        assert!(ContentKind::JavaScript.is_rewritable());
        assert!(ContentKind::Css.is_rewritable());
        assert!(!ContentKind::Json.is_rewritable());
        assert!(!ContentKind::Binary.is_rewritable());
    }
}
