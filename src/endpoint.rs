use crate::config::GateConfig;

/// SegmentPattern
///
/// One configured strict endpoint. `Dogovor` matches that segment exactly,
/// `Dogovor*` matches any segment starting with it. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentPattern {
    Exact(String),
    Prefix(String),
}

impl SegmentPattern {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_matches('/');
        match raw.strip_suffix('*') {
            Some("") => None,
            Some(prefix) => Some(SegmentPattern::Prefix(prefix.to_lowercase())),
            None if raw.is_empty() => None,
            None => Some(SegmentPattern::Exact(raw.to_lowercase())),
        }
    }

    fn matches(&self, segment: &str) -> bool {
        let segment = segment.to_lowercase();
        match self {
            SegmentPattern::Exact(name) => segment == *name,
            SegmentPattern::Prefix(prefix) => segment.starts_with(prefix.as_str()),
        }
    }
}

/// Whether a request goes to an endpoint that rejects auth material and unknown query keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointClass {
    Strict,
    Normal,
}

/// EndpointClassifier
///
/// Pure predicate over request paths. The leading API prefix (if present) is
/// stripped, then the first remaining segment is compared against the configured
/// patterns.
#[derive(Debug, Clone, Default)]
pub struct EndpointClassifier {
    api_prefix: Vec<String>,
    patterns: Vec<SegmentPattern>,
}

impl EndpointClassifier {
    pub fn new<I, S>(api_prefix: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            api_prefix: segments(api_prefix).map(str::to_lowercase).collect(),
            patterns: patterns
                .into_iter()
                .filter_map(|p| SegmentPattern::parse(p.as_ref()))
                .collect(),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(&config.api_prefix, &config.strict_endpoints)
    }

    pub fn classify(&self, path: &str) -> EndpointClass {
        if self.is_strict(path) {
            EndpointClass::Strict
        } else {
            EndpointClass::Normal
        }
    }

    pub fn is_strict(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut parts: Vec<&str> = segments(path).collect();

        let has_prefix = !self.api_prefix.is_empty()
            && parts.len() >= self.api_prefix.len()
            && parts
                .iter()
                .zip(&self.api_prefix)
                .all(|(part, prefix)| part.to_lowercase() == *prefix);
        if has_prefix {
            parts.drain(..self.api_prefix.len());
        }

        parts
            .first()
            .is_some_and(|first| self.patterns.iter().any(|p| p.matches(first)))
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
