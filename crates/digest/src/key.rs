use crate::consts::EXTENSION_REGEX;
use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use std::path::{Component, Path};

/// The root-relative name of `path`: forward-slash separated, no leading
/// slash, whatever the host platform's separator.
pub fn relative_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ErrorKind::OutsideRoot(path.to_path_buf()))?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_raise(|| ErrorKind::NonUtf8Path(path.to_path_buf()))?;
                segments.push(segment);
            },
            Component::CurDir => {},
            _ => exn::bail!(ErrorKind::OutsideRoot(path.to_path_buf())),
        }
    }
    if segments.is_empty() {
        exn::bail!(ErrorKind::OutsideRoot(path.to_path_buf()));
    }
    Ok(segments.join("/"))
}

/// Prefix a relative name with the remote key prefix. Surrounding slashes on
/// the prefix are ignored, and an empty prefix leaves the name as it is.
pub fn destination_key(prefix: &str, relative: &str) -> String {
    match prefix.trim_matches('/') {
        "" => relative.to_string(),
        prefix => format!("{prefix}/{relative}"),
    }
}

/// Insert `-<hash>` before the final one or two extensions of the last path
/// segment: `app.min.js` becomes `app-<hash>.min.js`. Names without an
/// extension get the hash appended.
pub fn insert_hash_before_extension(key: &str, hash: &str) -> String {
    let (directory, name) = match key.rsplit_once('/') {
        Some((directory, name)) => (Some(directory), name),
        None => (None, key),
    };
    let hashed = match EXTENSION_REGEX.find(name) {
        Some(found) if found.start() > 0 => {
            format!("{}-{hash}{}", &name[..found.start()], found.as_str())
        },
        _ => format!("{name}-{hash}"),
    };
    match directory {
        Some(directory) => format!("{directory}/{hashed}"),
        None => hashed,
    }
}

/// The final segment of a slash-separated key.
pub fn basename(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, name)| name)
}

/// The key of `name` as a sibling of `relative`.
pub(crate) fn sibling(relative: &str, name: &str) -> String {
    match relative.rsplit_once('/') {
        Some((directory, _)) => format!("{directory}/{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::PathBuf;

    #[rstest]
    #[case("app.min.js", "abc123", "app-abc123.min.js")]
    #[case("style.css", "abc123", "style-abc123.css")]
    #[case("assets/css/site.css.map", "ff", "assets/css/site-ff.css.map")]
    #[case("a.b.c.js", "h", "a.b-h.c.js")]
    #[case("LICENSE", "h", "LICENSE-h")]
    #[case("v1.2/LICENSE", "h", "v1.2/LICENSE-h")]
    #[case(".htaccess", "h", ".htaccess-h")]
    fn hash_placement(#[case] key: &str, #[case] hash: &str, #[case] expected: &str) {
        assert_eq!(insert_hash_before_extension(key, hash), expected);
    }

    #[rstest]
    #[case("", "css/a.css", "css/a.css")]
    #[case("assets", "css/a.css", "assets/css/a.css")]
    #[case("/assets/", "css/a.css", "assets/css/a.css")]
    #[case("static/v2", "app.js", "static/v2/app.js")]
    fn destination_keys(#[case] prefix: &str, #[case] relative: &str, #[case] expected: &str) {
        assert_eq!(destination_key(prefix, relative), expected);
    }

    #[test]
    fn relative_names_use_forward_slashes() {
        let root = PathBuf::from("/srv/public");
        let path = root.join("css").join("a.css");
        assert_eq!(relative_name(&root, &path).unwrap(), "css/a.css");
    }

    #[rstest]
    #[case("/srv/other/a.css")]
    #[case("/srv/public")]
    fn relative_name_outside_root(#[case] path: &str) {
        let err = relative_name(Path::new("/srv/public"), Path::new(path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::OutsideRoot(_)));
    }

    #[rstest]
    #[case("css/a.css", "a.css.map", "css/a.css.map")]
    #[case("app.js", "app.js.map", "app.js.map")]
    fn siblings(#[case] relative: &str, #[case] name: &str, #[case] expected: &str) {
        assert_eq!(sibling(relative, name), expected);
    }

    #[rstest]
    #[case("assets/css/a-h.css.map", "a-h.css.map")]
    #[case("top.js", "top.js")]
    fn basenames(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(basename(key), expected);
    }
}
