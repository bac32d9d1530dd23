use std::sync::LazyLock;

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new($regex).unwrap());
    };
}

macro_rules! bytes_regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<regex::bytes::Regex> =
            LazyLock::new(|| regex::bytes::Regex::new($regex).unwrap());
    };
}

pub(crate) const DEFAULT_PREHASHED_PATTERN: &str = r"(?P<hash>[.-][0-9a-f]{8,})(?:\.\w+)?\.\w+$";

// One or two trailing extensions: `.js`, `.min.js`, `.css.map`.
regex!(EXTENSION_REGEX, r"(\.\w+)?\.\w+$");
regex!(DEFAULT_PREHASHED_REGEX, DEFAULT_PREHASHED_PATTERN);

// Root-relative stylesheet references, optionally quoted.
bytes_regex!(CSS_URL_REGEX, r#"url\((['"]?)/([^'")\s]+)(['"]?)\)"#);
// Sourcemap comments only count at the very end of the file.
bytes_regex!(CSS_SOURCEMAP_REGEX, r"(/\*[#@]\s*sourceMappingURL=)([^\s*]+)(\s*\*/\s*)\z");
bytes_regex!(JS_SOURCEMAP_REGEX, r"(//[#@]\s*sourceMappingURL=)(\S+)(\s*)\z");
