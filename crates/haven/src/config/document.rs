use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{DEFAULT_TIMEOUT_MS, DEFAULT_VERSION};
use crate::strategy::StrategyKind;

fn default_version() -> String {
    DEFAULT_VERSION.to_owned()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retries() -> u32 {
    1
}

/// The configuration document served by the origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Opaque version token embedded in every generation name
    #[serde(default = "default_version")]
    pub version: String,

    /// Cache groups in document order, which is also match priority
    #[serde(default, alias = "cacheGroups")]
    pub cache: CacheGroups,

    #[serde(default)]
    pub network: NetworkSettings,

    /// Extra paths to precache on install
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub precache: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<Value>,
}

impl ConfigDocument {
    /// Version used for generation names; an empty token counts as missing
    pub fn cache_version(&self) -> &str {
        if self.version.is_empty() {
            DEFAULT_VERSION
        } else {
            &self.version
        }
    }

    /// Look up a dot-separated path (e.g. `cache.static.strategy`) in the
    /// document rendered as JSON.
    ///
    /// Returns `None` for an empty path, a missing key, or when traversal hits
    /// a value that is not an object.
    pub fn get(&self, path: &str) -> Option<Value> {
        if path.is_empty() {
            return None;
        }

        let mut value = serde_json::to_value(self).ok()?;
        for key in path.split('.') {
            value = match value {
                Value::Object(mut map) => map.remove(key)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Like [`ConfigDocument::get`], falling back to `default`
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }
}

/// Settings shared by all network calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Timeout in milliseconds for groups that do not set their own
    #[serde(default = "default_timeout", alias = "timeoutMs")]
    pub timeout: u64,

    /// Retry budget advertised to callers; strategies never retry internally
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_MS,
            retries: default_retries(),
        }
    }
}

/// One cache group of the document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheGroupSpec {
    /// Strategy name as written in the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    /// Regular expressions matched against the request path
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Max-age in seconds
    #[serde(
        default,
        alias = "maxAgeSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_age: Option<u64>,

    /// Network timeout in milliseconds
    #[serde(default, alias = "timeoutMs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl CacheGroupSpec {
    pub fn new(strategy: StrategyKind, patterns: &[&str]) -> Self {
        Self {
            strategy: Some(strategy.as_str().to_owned()),
            patterns: patterns.iter().map(|p| (*p).to_owned()).collect(),
            max_age: None,
            timeout: None,
        }
    }

    pub fn with_max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    /// The strategy this group asks for; unknown or missing names mean network-first
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy
            .as_deref()
            .and_then(StrategyKind::from_name)
            .unwrap_or_default()
    }
}

/// Cache groups keyed by name, kept in the order the document lists them.
///
/// A JSON object has no inherent order, but routing is first-match over the
/// groups, so the order the document was written in is preserved explicitly.
/// A repeated key replaces the earlier group in place.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheGroups(Vec<(String, CacheGroupSpec)>);

impl CacheGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a group, keeping the position of an existing name
    pub fn insert(&mut self, name: impl Into<String>, spec: CacheGroupSpec) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = spec,
            None => self.0.push((name, spec)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, spec: CacheGroupSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CacheGroupSpec> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheGroupSpec)> {
        self.0.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for CacheGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(name, spec)| (name, spec)))
    }
}

impl<'de> Deserialize<'de> for CacheGroups {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupsVisitor;

        impl<'de> Visitor<'de> for GroupsVisitor {
            type Value = CacheGroups;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of cache group names to cache group settings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut groups = CacheGroups::new();
                while let Some((name, spec)) = access.next_entry::<String, CacheGroupSpec>()? {
                    groups.insert(name, spec);
                }
                Ok(groups)
            }
        }

        deserializer.deserialize_map(GroupsVisitor)
    }
}
