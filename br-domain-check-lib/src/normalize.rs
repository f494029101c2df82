//! Domain normalization and deduplication.
//!
//! Turns arbitrary report cells ("HTTP://WWW.Loja.COM.BR/produto?id=1",
//! "blog.exemplo.br", ...) into registrable `.br` / `.com.br` names.

use crate::error::VerifierError;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

lazy_static::lazy_static! {
    // Labels of letters, digits and hyphens; final label alphabetic, 2+ chars.
    static ref HOST_PATTERN: Regex =
        Regex::new(r"^(?:[a-z0-9-]+\.)+[a-z]{2,}$").expect("host pattern compiles");
}

const MAX_HOST_LEN: usize = 253;

/// A normalized, registrable `.br` or `.com.br` domain.
///
/// Only [`normalize`] creates values of this type, so holding a `Domain`
/// means the string is lowercase, has no scheme, `www.`, path or port, and
/// has been collapsed to its registrable form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw candidate string into a registrable `.br` domain.
///
/// Steps, in order:
/// 1. reject empty input
/// 2. trim and lowercase
/// 3. strip a leading `http://` / `https://` and a following `www.`
/// 4. cut at the first `/`, whitespace, `?`, `#` or `:`
/// 5. validate host syntax
/// 6. collapse subdomains (`a.b.loja.com.br` -> `loja.com.br`, `x.site.br` -> `site.br`)
/// 7. reject anything outside `.br`
///
/// Malformed input is reported as `Err(VerifierError::InvalidDomain)`; this
/// function never panics.
///
/// # Examples
///
/// ```rust
/// use br_domain_check_lib::normalize;
///
/// let domain = normalize("HTTP://WWW.Example.COM.BR/path?x=1").unwrap();
/// assert_eq!(domain.as_str(), "example.com.br");
/// assert!(normalize("example.com").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<Domain, VerifierError> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(VerifierError::invalid_domain(raw, "empty value"));
    }

    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme
        .strip_prefix("www.")
        .unwrap_or(without_scheme);

    let host = without_www
        .split(|c: char| matches!(c, '/' | '?' | '#' | ':') || c.is_whitespace())
        .next()
        .unwrap_or_default();

    if host.len() > MAX_HOST_LEN {
        return Err(VerifierError::invalid_domain(raw, "host name too long"));
    }
    if !HOST_PATTERN.is_match(host) {
        return Err(VerifierError::invalid_domain(raw, "not a valid host name"));
    }

    let registrable = registrable_form(host);

    if registrable == "com.br" {
        return Err(VerifierError::invalid_domain(
            raw,
            "public suffix without a registrable label",
        ));
    }
    // Collapsing can promote an inner `www` label to the front.
    if registrable.starts_with("www.") {
        return Err(VerifierError::invalid_domain(
            raw,
            "no registrable label besides www",
        ));
    }
    if !registrable.ends_with(".br") {
        return Err(VerifierError::invalid_domain(raw, "not a .br domain"));
    }

    Ok(Domain(registrable.to_string()))
}

/// Keep only the registrable tail of a validated host.
fn registrable_form(host: &str) -> &str {
    let keep = if host.ends_with(".com.br") {
        3
    } else if host.ends_with(".br") {
        2
    } else {
        return host;
    };

    let labels = host.split('.').count();
    if labels <= keep {
        return host;
    }

    // Byte offset just after the (labels - keep)-th dot.
    let mut offset = 0;
    for _ in 0..(labels - keep) {
        match host[offset..].find('.') {
            Some(dot) => offset += dot + 1,
            None => return host,
        }
    }
    &host[offset..]
}

/// Deduplicated set of domains submitted to one job.
///
/// Built once from raw candidates; first-seen order is kept so runs are
/// reproducible, but nothing downstream depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    domains: Vec<Domain>,
    rejected: usize,
}

impl DomainSet {
    /// Normalize every candidate, drop rejects and duplicates.
    pub fn from_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut domains = Vec::new();
        let mut rejected = 0;

        for candidate in candidates {
            match normalize(candidate.as_ref()) {
                Ok(domain) => {
                    if seen.insert(domain.clone()) {
                        domains.push(domain);
                    }
                }
                Err(_) => rejected += 1,
            }
        }

        Self { domains, rejected }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Number of candidates that failed normalization.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn as_slice(&self) -> &[Domain] {
        &self.domains
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Domain> {
        self.domains.iter()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.iter().any(|d| d.as_str() == domain)
    }
}

impl<'a> IntoIterator for &'a DomainSet {
    type Item = &'a Domain;
    type IntoIter = std::slice::Iter<'a, Domain>;

    fn into_iter(self) -> Self::IntoIter {
        self.domains.iter()
    }
}
