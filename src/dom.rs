//! Minimal document model: the script and link elements the loader
//! touches, plus the `relList` feature probe.

use crate::tracker::ScriptHandle;
use thiserror::Error;

/// `relList.supports` threw (or `relList` is missing).
#[derive(Debug, Clone, Error)]
#[error("relList probe failed: {0}")]
pub struct ProbeError(pub String);

/// Feature-detection hook for link relations.
pub trait PreloadProbe {
    fn rel_list_supports(&self, token: &str) -> Result<bool, ProbeError>;
}

/// How the simulated engine answers the `relList` probe.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PreloadSupport {
    Native,
    Missing,
    /// The probe itself throws.
    Broken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptElement {
    pub id: String,
    pub src: String,
    pub ready_state: Option<String>,
    /// Inline handler attributes; `None` once detached.
    pub onload: Option<String>,
    pub onreadystatechange: Option<String>,
}

impl ScriptElement {
    pub fn new(id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            ready_state: None,
            onload: None,
            onreadystatechange: None,
        }
    }

    pub fn with_onload(mut self, handler: impl Into<String>) -> Self {
        self.onload = Some(handler.into());
        self
    }

    pub fn with_ready_state(mut self, state: impl Into<String>) -> Self {
        self.ready_state = Some(state.into());
        self
    }

    pub fn is_hooked(&self) -> bool {
        self.onload.is_some() || self.onreadystatechange.is_some()
    }
}

impl ScriptHandle for ScriptElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn ready_state(&self) -> Option<&str> {
        self.ready_state.as_deref()
    }

    fn detach_hooks(&mut self) {
        self.onload = None;
        self.onreadystatechange = None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkElement {
    pub id: String,
    pub href: String,
    /// `None` after the polyfill has taken the link over.
    pub rel: Option<String>,
    pub as_: Option<String>,
    pub media: Option<String>,
    /// `data-sb`: binding name of the embed that emitted the link.
    pub owner: Option<String>,
}

impl LinkElement {
    /// `<link rel="preload" as="style">` awaiting promotion.
    pub fn style_preload(id: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            href: href.into(),
            rel: Some("preload".into()),
            as_: Some("style".into()),
            media: None,
            owner: None,
        }
    }

    pub fn stylesheet(href: impl Into<String>, media: Option<String>) -> Self {
        Self {
            id: String::new(),
            href: href.into(),
            rel: Some("stylesheet".into()),
            as_: None,
            media,
            owner: None,
        }
    }

    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media = Some(media.into());
        self
    }

    pub fn owned_by(mut self, binding: impl Into<String>) -> Self {
        self.owner = Some(binding.into());
        self
    }

    pub fn is_pending_style_preload(&self) -> bool {
        self.rel.as_deref() == Some("preload") && self.as_.as_deref() == Some("style")
    }

    /// Whether the embed bound at `binding` emitted this link.
    pub fn belongs_to(&self, binding: &str) -> bool {
        self.owner.as_deref() == Some(binding)
    }
}

#[derive(Clone, Debug)]
pub struct Document {
    scripts: Vec<ScriptElement>,
    links: Vec<LinkElement>,
    preload_support: PreloadSupport,
}

impl Document {
    pub fn new(preload_support: PreloadSupport) -> Self {
        Self {
            scripts: Vec::new(),
            links: Vec::new(),
            preload_support,
        }
    }

    pub fn push_script(&mut self, script: ScriptElement) {
        self.scripts.push(script);
    }

    pub fn push_link(&mut self, link: LinkElement) {
        self.links.push(link);
    }

    pub fn scripts(&self) -> &[ScriptElement] {
        &self.scripts
    }

    pub fn script_mut(&mut self, id: &str) -> Option<&mut ScriptElement> {
        self.scripts.iter_mut().find(|s| s.id == id)
    }

    pub fn links(&self) -> &[LinkElement] {
        &self.links
    }

    pub fn links_mut(&mut self) -> &mut [LinkElement] {
        &mut self.links
    }

    pub fn link(&self, id: &str) -> Option<&LinkElement> {
        self.links.iter().find(|l| l.id == id)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(PreloadSupport::Native)
    }
}

impl PreloadProbe for Document {
    fn rel_list_supports(&self, token: &str) -> Result<bool, ProbeError> {
        match self.preload_support {
            PreloadSupport::Native => Ok(token == "preload"),
            PreloadSupport::Missing => Ok(false),
            PreloadSupport::Broken => Err(ProbeError("relList is undefined".into())),
        }
    }
}
