//! Reference rewriting.
//!
//! Stylesheets and scripts refer to other assets by their original names.
//! Once every file has a hashed key, those references are pointed at the
//! hashed keys so the hashed copies only ever load other hashed copies.
//!
//! Rules are looked up by [`ContentKind`] and applied in order. Each rule
//! pairs a byte pattern with a resolver that produces the replacement for a
//! match, or nothing when the reference is not in the digest (in which case
//! the match is left exactly as it was). Patterns work on raw bytes so
//! content that is not valid UTF-8 passes through rather than failing.

use crate::consts::{CSS_SOURCEMAP_REGEX, CSS_URL_REGEX, JS_SOURCEMAP_REGEX};
use crate::error::{ErrorKind, Result};
use crate::hash::{ContentHash, hash_bytes};
use crate::key::{basename, sibling};
use crate::kind::{Classification, ContentKind, classify};
use crate::manifest::Digest;
use cachet_compress::Compression;
use exn::ResultExt;
use regex::bytes::{Captures, Regex};
use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument};

/// Outcome of rewriting one asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rewrite {
    /// Nothing referenced by the asset is in the digest; upload the file
    /// itself.
    Unchanged,
    /// The final body (recompressed if the source was gzip) and its hash.
    Changed { body: Vec<u8>, hash: ContentHash },
}

struct Scope<'a> {
    relative: &'a str,
    digest: &'a Digest,
}

type Resolver = fn(&Captures<'_>, &Scope<'_>) -> Option<Vec<u8>>;

struct Rule {
    name: &'static str,
    pattern: &'static LazyLock<Regex>,
    resolve: Resolver,
}

static CSS_RULES: [Rule; 2] = [
    Rule { name: "css-url", pattern: &CSS_URL_REGEX, resolve: resolve_css_url },
    Rule { name: "css-sourcemap", pattern: &CSS_SOURCEMAP_REGEX, resolve: resolve_sourcemap },
];

static JS_RULES: [Rule; 1] = [Rule { name: "js-sourcemap", pattern: &JS_SOURCEMAP_REGEX, resolve: resolve_sourcemap }];

static RULES: [(ContentKind, &[Rule]); 2] = [(ContentKind::Css, &CSS_RULES), (ContentKind::JavaScript, &JS_RULES)];

fn rules_for(kind: ContentKind) -> Option<&'static [Rule]> {
    RULES.iter().find(|(candidate, _)| *candidate == kind).map(|(_, rules)| *rules)
}

// `url(<quote>/<path><quote>)` => `url(<quote>/<hashed key><quote>)`
fn resolve_css_url(captures: &Captures<'_>, scope: &Scope<'_>) -> Option<Vec<u8>> {
    let path = std::str::from_utf8(&captures[2]).ok()?;
    let key = scope.digest.get(path)?;
    let parts: [&[u8]; 6] = [b"url(", &captures[1], b"/", key.as_bytes(), &captures[3], b")"];
    Some(parts.concat())
}

// The map is named relative to the asset it belongs to, and hashed assets
// sit next to each other, so only the basename of the hashed key is needed.
fn resolve_sourcemap(captures: &Captures<'_>, scope: &Scope<'_>) -> Option<Vec<u8>> {
    let name = std::str::from_utf8(&captures[2]).ok()?;
    let key = scope.digest.get(&sibling(scope.relative, name))?;
    Some([&captures[1], basename(key).as_bytes(), &captures[3]].concat())
}

/// Rewrite an asset body against a completed digest.
///
/// `relative` is the asset's own relative name, used to resolve sourcemap
/// names that are relative to it. Gzip bodies are decoded first and the
/// changed result is encoded again.
pub fn rewrite(classification: Classification, relative: &str, content: &[u8], digest: &Digest) -> Result<Rewrite> {
    let Some(rules) = rules_for(classification.kind) else {
        return Ok(Rewrite::Unchanged);
    };
    let source: Cow<'_, [u8]> = match classification.compression {
        Compression::None => Cow::Borrowed(content),
        compression => Cow::Owned(compression.decompress(content).or_raise(|| ErrorKind::Compression)?),
    };

    let scope = Scope { relative, digest };
    let mut text: Cow<'_, [u8]> = Cow::Borrowed(source.as_ref());
    for rule in rules {
        let replaced = match rule.pattern.replace_all(&text, |captures: &Captures<'_>| {
            (rule.resolve)(captures, &scope).unwrap_or_else(|| captures[0].to_vec())
        }) {
            Cow::Owned(replaced) => replaced,
            Cow::Borrowed(_) => continue,
        };
        debug!(rule = rule.name, relative, "applied rewrite rule");
        text = Cow::Owned(replaced);
    }

    // A match whose reference is not in the digest is replaced by itself.
    if *text == *source {
        return Ok(Rewrite::Unchanged);
    }
    let body = match classification.compression {
        Compression::None => text.into_owned(),
        compression => compression.compress(&text).or_raise(|| ErrorKind::Compression)?,
    };
    let hash = hash_bytes(&body);
    Ok(Rewrite::Changed { body, hash })
}

/// Read and rewrite an asset from disk. Assets that are never rewritten are
/// not read at all.
#[instrument(skip(digest), fields(path = %path.display()))]
pub async fn rewrite_file(path: &Path, relative: &str, digest: Arc<Digest>) -> Result<Rewrite> {
    let classification = classify(path);
    if !classification.kind.is_rewritable() {
        return Ok(Rewrite::Unchanged);
    }
    let content = tokio::fs::read(path).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
    let relative = relative.to_string();
    tokio::task::spawn_blocking(move || rewrite(classification, &relative, &content, &digest))
        .await
        .or_raise(|| ErrorKind::Interrupted)?
}
