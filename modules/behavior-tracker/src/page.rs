//! Page identity: the current URL and its origin + path join key.

use url::{Origin, Url};

use crate::error::{Result, TrackerError};

/// Normalize a page URL to origin + path, dropping query and fragment.
///
/// Returns `None` for unparsable URLs and for URLs without a tuple origin
/// (`data:`, `file:` and friends); such pages never match a condition.
pub fn normalize_page_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    normalize(&url)
}

fn normalize(url: &Url) -> Option<String> {
    match url.origin() {
        origin @ Origin::Tuple(..) => Some(format!("{}{}", origin.ascii_serialization(), url.path())),
        Origin::Opaque(_) => None,
    }
}

/// The page the tracker is embedded in, fixed for one page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    url: Url,
    normalized: String,
}

impl PageContext {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim())
            .map_err(|e| TrackerError::InvalidPage(format!("{raw}: {e}")))?;
        let normalized = normalize(&url)
            .ok_or_else(|| TrackerError::InvalidPage(format!("{raw}: no origin")))?;
        Ok(Self { url, normalized })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Origin + path of the page.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }
}
