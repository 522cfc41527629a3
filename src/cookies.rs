//! Cookie persistence for Google Trends sessions.
//!
//! Trends answers fresh sessions with 429s more often than warm ones, so the
//! session cookies (mainly `NID`) are kept between runs.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default cookie file path: `~/.rustmonitor_trends_cookies.json`
fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".rustmonitor_trends_cookies.json"))
        .ok_or_else(|| MonitorError::Config("Cannot determine home directory".to_string()))
}

/// Stored cookie, compatible with browser-export JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, alias = "httpOnly")]
    pub http_only: bool,
    #[serde(default, alias = "expirationDate")]
    pub expires: Option<f64>,
}

/// Split a `Cookie:` header (`a=1; b=2`) into cookies for `domain`.
pub fn parse_cookie_header(header: &str, domain: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            expires: None,
        })
        .collect()
}

/// Whether a cookie for `a` and one for `b` are sent to the same hosts
/// (equal domains, or one a parent domain of the other).
fn domains_overlap(a: &str, b: &str) -> bool {
    let a = a.trim_start_matches('.');
    let b = b.trim_start_matches('.');
    a == b || a.ends_with(&format!(".{}", b)) || b.ends_with(&format!(".{}", a))
}

/// Loads and saves the cookie file
pub struct CookieManager {
    path: PathBuf,
}

impl CookieManager {
    /// Manager for the default cookie file
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_cookie_path()?,
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load cookies from file
    ///
    /// Returns empty vec if file doesn't exist or is invalid
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!("Cookie file not found: {:?}", self.path);
            return Vec::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<Cookie>>(&content) {
                Ok(cookies) => {
                    info!("Loaded {} cookies from {:?}", cookies.len(), self.path);
                    cookies
                }
                Err(e) => {
                    warn!("Failed to parse cookies: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read cookie file: {}", e);
                Vec::new()
            }
        }
    }

    /// Merge `cookies` into the stored set and save.
    ///
    /// A stored cookie with the same name on the same or an overlapping domain
    /// is updated in place. An exact domain match is replaced outright;
    /// otherwise only the value changes, so a `.google.com` cookie keeps its
    /// broader scope when the session reports it for `trends.google.com`.
    pub fn merge(&self, cookies: &[Cookie]) -> Result<usize> {
        let mut stored = self.load();
        for cookie in cookies {
            match stored
                .iter_mut()
                .find(|c| c.name == cookie.name && domains_overlap(&c.domain, &cookie.domain))
            {
                Some(existing) if existing.domain == cookie.domain => *existing = cookie.clone(),
                Some(existing) => existing.value = cookie.value.clone(),
                None => stored.push(cookie.clone()),
            }
        }
        self.save(&stored)?;
        Ok(stored.len())
    }

    /// Import a browser-exported JSON cookie list, keeping Google cookies only.
    pub fn import(&self, source: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(source)?;
        let cookies: Vec<Cookie> = serde_json::from_str(&content)?;
        let google: Vec<Cookie> = cookies
            .into_iter()
            .filter(|c| c.domain.trim_start_matches('.').ends_with("google.com"))
            .collect();

        if google.is_empty() {
            return Err(MonitorError::Validation(format!(
                "No google.com cookies found in {:?}",
                source
            )));
        }

        info!("Importing {} Google cookies from {:?}", google.len(), source);
        self.merge(&google)
    }

    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, content)?;
        info!("Saved {} cookies to {:?}", cookies.len(), self.path);
        Ok(())
    }

    /// Clear stored cookies
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared cookies at {:?}", self.path);
        }
        Ok(())
    }
}

impl Default for CookieManager {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self {
            path: PathBuf::from(".rustmonitor_trends_cookies.json"),
        })
    }
}
