//! Fragment generation: the initial and subsequent HTML fragments for one
//! set of assets.
//!
//! The initial fragment carries the bootstrap script, async scripts,
//! preloaded styles (with a `<noscript>` fallback) and inlined critical CSS.
//! The subsequent fragment is what a repeat visitor with a matching
//! completion cookie gets: plain synchronous tags.
//!
//! Every tracked resource is identified by a truncated content digest; the
//! master hash is the digest of all identifiers joined with `-`. Markup is
//! first written against the instance placeholder and bound to the final
//! `sb<master hash>` name at the end, once the hash is known. Style preloads
//! also carry that name in `data-sb`, which scopes the preload polyfill to
//! the links of its own embed.

use crate::cookie::cookie_name;
use crate::resource::{PendingSet, ResourceId, Weight};
use crate::script::{binding_name, bootstrap, instantiation, INSTANCE_PLACEHOLDER};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Shortest identifier ever emitted, in hex digits.
pub const MIN_HASH_LENGTH: usize = 8;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AssetRole {
    /// Must load before the tracker completes.
    #[default]
    Blocking,
    /// Prefetch-only; tracked with weight 0 and left out of the
    /// subsequent fragment.
    Prefetch,
}

impl AssetRole {
    fn weight(self) -> Weight {
        match self {
            AssetRole::Blocking => Weight::Required,
            AssetRole::Prefetch => Weight::Prefetch,
        }
    }
}

/// A buffered build asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    /// Path relative to the output root, as it should appear in URLs.
    pub path: String,
    pub contents: String,
    pub role: AssetRole,
}

impl Asset {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            role: AssetRole::Blocking,
        }
    }

    pub fn with_role(mut self, role: AssetRole) -> Self {
        self.role = role;
        self
    }
}

#[derive(Clone, Debug)]
pub struct FragmentOptions {
    /// Prepended to every asset path in `src` / `href`.
    pub prefix: String,
    pub slot: Option<String>,
    /// Name of a global function to run on completion.
    pub callback: Option<String>,
    pub hash_length: usize,
}

impl Default for FragmentOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            slot: None,
            callback: None,
            hash_length: MIN_HASH_LENGTH,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Fragments {
    pub initial: String,
    pub subsequent: String,
    /// Identifiers of all tracked resources, in emission order.
    pub resources: Vec<ResourceId>,
    /// Master hash; `None` when nothing is tracked.
    pub hash: Option<String>,
    /// Name of the completion cookie.
    pub cookie: String,
}

/// Hex SHA-256 of `content`, truncated to `length` (at least
/// [`MIN_HASH_LENGTH`]) digits.
pub fn content_hash(content: &str, length: usize) -> String {
    let digest = hex::encode(Sha256::digest(content.as_bytes()));
    let n = length.max(MIN_HASH_LENGTH).min(digest.len());
    digest[..n].to_owned()
}

pub fn master_hash(resources: &[ResourceId], length: usize) -> Option<String> {
    if resources.is_empty() {
        return None;
    }
    let joined = resources
        .iter()
        .map(ResourceId::as_str)
        .collect::<Vec<_>>()
        .join("-");
    Some(content_hash(&joined, length))
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn normalized(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

/// Build both fragments for `js` and `css` assets plus optional critical CSS.
pub fn generate(
    js: &[Asset],
    css: &[Asset],
    critical: Option<&Asset>,
    options: &FragmentOptions,
) -> Fragments {
    let slot = normalized(options.slot.as_deref());
    let callback = normalized(options.callback.as_deref());
    let mut result = Fragments {
        cookie: cookie_name(slot.as_deref()),
        ..Fragments::default()
    };
    if js.is_empty() && css.is_empty() && critical.is_none() {
        return result;
    }

    let mut weights: Vec<(ResourceId, Weight)> = Vec::new();
    let mut initial = String::new();
    let mut track = |asset: &Asset, result: &mut Fragments| {
        let id = ResourceId::new(content_hash(&asset.contents, options.hash_length));
        result.resources.push(id.clone());
        weights.push((id.clone(), asset.role.weight()));
        (id, format!("{}{}", escape_attr(&options.prefix), escape_attr(&asset.path)))
    };

    for asset in js {
        let (id, url) = track(asset, &mut result);
        match asset.role {
            AssetRole::Blocking => {
                initial.push_str(&format!(
                    "<script src=\"{url}\" id=\"{id}\" async defer \
                     onload=\"{INSTANCE_PLACEHOLDER}.onloadScript(this)\" \
                     onreadystatechange=\"{INSTANCE_PLACEHOLDER}.onloadScript(this)\"></script>"
                ));
                result
                    .subsequent
                    .push_str(&format!("<script src=\"{url}\"></script>"));
            }
            AssetRole::Prefetch => initial.push_str(&format!(
                "<link rel=\"prefetch\" href=\"{url}\" id=\"{id}\" as=\"script\" \
                 onload=\"{INSTANCE_PLACEHOLDER}.loaded(this.id)\">"
            )),
        }
    }

    if let Some(critical) = critical {
        initial.push_str(&format!("<style>{}</style>", critical.contents));
    }

    let mut synchronous_css = String::new();
    let mut preloads_styles = false;
    for asset in css {
        let (id, url) = track(asset, &mut result);
        match asset.role {
            AssetRole::Blocking => {
                preloads_styles = true;
                initial.push_str(&format!(
                    "<link rel=\"preload\" href=\"{url}\" id=\"{id}\" as=\"style\" \
                     data-sb=\"{INSTANCE_PLACEHOLDER}\" \
                     onload=\"this.rel='stylesheet';{INSTANCE_PLACEHOLDER}.loaded(this.id)\">"
                ));
                synchronous_css.push_str(&format!("<link rel=\"stylesheet\" href=\"{url}\">"));
            }
            AssetRole::Prefetch => initial.push_str(&format!(
                "<link rel=\"prefetch\" href=\"{url}\" id=\"{id}\" as=\"style\" \
                 onload=\"{INSTANCE_PLACEHOLDER}.loaded(this.id)\">"
            )),
        }
    }
    if !synchronous_css.is_empty() {
        initial.push_str(&format!("<noscript>{synchronous_css}</noscript>"));
        result.subsequent.push_str(&synchronous_css);
    }

    result.hash = master_hash(&result.resources, options.hash_length);
    if let Some(hash) = &result.hash {
        let pending = if weights.iter().all(|(_, w)| *w == Weight::Required) {
            PendingSet::list(weights.into_iter().map(|(id, _)| id))
        } else {
            PendingSet::weighted(weights)
        };
        let binding = binding_name(hash);
        let call = instantiation(&pending, Some(hash), slot.as_deref(), callback.as_deref());
        let script = bootstrap(preloads_styles, &call, &binding);
        result.initial = script + &initial.replace(INSTANCE_PLACEHOLDER, &binding);
    } else {
        result.initial = initial;
    }

    debug!(
        resources = result.resources.len(),
        hash = result.hash.as_deref().unwrap_or(""),
        cookie = %result.cookie,
        "generated fragments"
    );
    result
}
