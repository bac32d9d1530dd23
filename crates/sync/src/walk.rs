//! Directory discovery.

use crate::error::{ErrorKind, Result};
use async_stream::stream;
use cachet_digest::relative_name;
use exn::ResultExt;
use futures::Stream;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tracing::debug;

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

/// Stream every file under `root`, skipping anything whose root-relative
/// path matches one of `ignore`. Ignored directories are not descended into.
///
/// Entries are visited in name order (a directory's files, then its
/// subdirectories depth-first), so the same tree always yields the same
/// sequence. Symlinked files are followed; symlinked directories are not.
pub fn list_files<'a>(root: &'a Path, ignore: &'a [Pattern]) -> impl Stream<Item = Result<PathBuf>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        let mut stack = vec![root.to_path_buf()];
        'dirs: while let Some(current) = stack.pop() {
            let entries = match read_sorted(&current).await {
                Ok(entries) => entries,
                Err(e) => {
                    yield Err(e);
                    continue 'dirs;
                },
            };
            let mut descend = Vec::new();
            for entry in entries {
                match process_entry(root, ignore, entry).await {
                    Ok(WalkEntry::File(path)) => yield Ok(path),
                    Ok(WalkEntry::Descend(path)) => descend.push(path),
                    Ok(WalkEntry::Skip) => {},
                    Err(e) => yield Err(e),
                }
            }
            // Popped in name order.
            stack.extend(descend.into_iter().rev());
        }
    })
}

async fn read_sorted(directory: &Path) -> Result<Vec<DirEntry>> {
    let mut reader = fs::read_dir(directory).await.or_raise(|| ErrorKind::Io(directory.to_path_buf()))?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.or_raise(|| ErrorKind::Io(directory.to_path_buf()))? {
        entries.push(entry);
    }
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

async fn process_entry(root: &Path, ignore: &[Pattern], entry: DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    let relative = relative_name(root, &path).or_raise(|| ErrorKind::Io(path.clone()))?;
    if ignore.iter().any(|pattern| pattern.matches(&relative)) {
        debug!(%relative, "ignored");
        return Ok(WalkEntry::Skip);
    }
    let file_type = entry.file_type().await.or_raise(|| ErrorKind::Io(path.clone()))?;
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(path));
    }
    if file_type.is_file() {
        return Ok(WalkEntry::File(path));
    }
    if file_type.is_symlink() {
        // Note: a broken link is dropped rather than failing the walk.
        if let Ok(metadata) = fs::metadata(&path).await
            && metadata.is_file()
        {
            return Ok(WalkEntry::File(path));
        }
    }
    Ok(WalkEntry::Skip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{StreamExt, TryStreamExt};

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "index.html",
            "css/b.css",
            "css/a.css",
            "css/a.css.map",
            "img/logo.png",
            "node_modules/pkg/index.js",
            "app.js",
        ] {
            let path = dir.path().join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, file).unwrap();
        }
        dir
    }

    async fn relative_listing(root: &Path, ignore: &[Pattern]) -> Vec<String> {
        let files: Vec<PathBuf> = list_files(root, ignore).try_collect().await.unwrap();
        files.iter().map(|path| relative_name(root, path).unwrap()).collect()
    }

    #[tokio::test]
    async fn lists_in_stable_order() {
        let dir = tree();
        assert_eq!(
            relative_listing(dir.path(), &[]).await,
            vec![
                "app.js",
                "index.html",
                "css/a.css",
                "css/a.css.map",
                "css/b.css",
                "img/logo.png",
                "node_modules/pkg/index.js",
            ]
        );
    }

    #[tokio::test]
    async fn ignores_files_and_prunes_directories() {
        let dir = tree();
        let ignore = vec![Pattern::new("*.map").unwrap(), Pattern::new("node_modules").unwrap()];
        assert_eq!(
            relative_listing(dir.path(), &ignore).await,
            vec!["app.js", "index.html", "css/a.css", "css/b.css", "img/logo.png"]
        );
    }

    #[tokio::test]
    async fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("missing");
        let mut results: Vec<_> = list_files(&root, &[]).collect().await;
        assert_eq!(results.len(), 1);
        let err = results.remove(0).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
    }
}
