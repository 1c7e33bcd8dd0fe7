//! Bundling: sort incoming build files into JS / CSS / other, then emit the
//! fragment files.
//!
//! Only buffered files are accepted. Everything that is neither JS nor CSS
//! passes through unchanged, with the generated fragments attached so
//! templates downstream can reference them.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fragment::{generate, Asset, AssetRole, Fragments};
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssetKind {
    Js,
    Css,
    Other,
}

pub struct Classifier {
    js: Vec<Regex>,
    css: Vec<Regex>,
    prefetch: Vec<Regex>,
}

/// Compile non-blank patterns.
fn compile(kind: &'static str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            Regex::new(p).map_err(|source| Error::InvalidPattern {
                kind,
                pattern: p.to_owned(),
                source,
            })
        })
        .collect()
}

impl Classifier {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            js: compile("js", &config.js)?,
            css: compile("css", &config.css)?,
            prefetch: compile("prefetch", &config.prefetch)?,
        })
    }

    pub fn kind(&self, path: &str) -> AssetKind {
        if self.js.iter().any(|r| r.is_match(path)) {
            AssetKind::Js
        } else if self.css.iter().any(|r| r.is_match(path)) {
            AssetKind::Css
        } else {
            AssetKind::Other
        }
    }

    pub fn role(&self, path: &str) -> AssetRole {
        if self.prefetch.iter().any(|r| r.is_match(path)) {
            AssetRole::Prefetch
        } else {
            AssetRole::Blocking
        }
    }
}

/// One file entering the bundler.
#[derive(Clone, Debug)]
pub enum StreamInput {
    Buffered(Asset),
    /// Contents only available as a stream; always rejected.
    Streaming { path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
    pub contents: String,
    /// Fragments attached to passed-through files.
    pub data: Option<Fragments>,
}

pub struct Bundle {
    config: Config,
    classifier: Classifier,
    critical: Option<Asset>,
    js: Vec<Asset>,
    css: Vec<Asset>,
    other: Vec<Asset>,
}

impl Bundle {
    pub fn new(config: Config, critical: Option<Asset>) -> Result<Self> {
        let classifier = Classifier::new(&config)?;
        Ok(Self {
            config,
            classifier,
            critical,
            js: Vec::new(),
            css: Vec::new(),
            other: Vec::new(),
        })
    }

    pub fn push(&mut self, input: StreamInput) -> Result<AssetKind> {
        let asset = match input {
            StreamInput::Buffered(asset) => asset,
            StreamInput::Streaming { path } => return Err(Error::StreamingUnsupported { path }),
        };
        let kind = self.classifier.kind(&asset.path);
        trace!(path = %asset.path, ?kind, "classified asset");
        match kind {
            AssetKind::Js | AssetKind::Css => {
                let role = self.classifier.role(&asset.path);
                let asset = asset.with_role(role);
                if kind == AssetKind::Js {
                    self.js.push(asset);
                } else {
                    self.css.push(asset);
                }
            }
            AssetKind::Other => self.other.push(asset),
        }
        Ok(kind)
    }

    /// Generate the fragments and the files to emit: the two fragments
    /// (only when something is tracked), every passed-through file, and
    /// the JSON data file if enabled.
    pub fn finish(self) -> Result<Vec<OutputFile>> {
        let fragments = generate(
            &self.js,
            &self.css,
            self.critical.as_ref(),
            &self.config.fragment_options(),
        );
        let mut out = Vec::new();

        if !fragments.resources.is_empty() {
            out.push(OutputFile {
                path: self.config.initial_path(),
                contents: fragments.initial.clone(),
                data: None,
            });
            out.push(OutputFile {
                path: self.config.subsequent_path(),
                contents: fragments.subsequent.clone(),
                data: None,
            });
        }

        for asset in self.other {
            out.push(OutputFile {
                path: PathBuf::from(asset.path),
                contents: asset.contents,
                data: Some(fragments.clone()),
            });
        }

        if self.config.data {
            out.push(OutputFile {
                path: self.config.data_path(),
                contents: serde_json::to_string_pretty(&fragments)?,
                data: None,
            });
        }

        debug!(files = out.len(), "bundle finished");
        Ok(out)
    }
}
