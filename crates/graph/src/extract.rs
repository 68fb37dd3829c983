use crate::error::{GraphError, Result};
use crate::types::{Entity, EntityType};
use regex::Regex;
use std::collections::BTreeMap;

const DICTIONARY_CONFIDENCE: f32 = 0.95;
const METRIC_CONFIDENCE: f32 = 0.9;

/// (pattern, type, confidence). Capture group 1 is the entity name.
const PATTERNS: [(&str, EntityType, f32); 8] = [
    (
        r"(?i)\b((?:service|svc)-[a-z0-9]+(?:-[a-z0-9]+)*)\b",
        EntityType::Service,
        0.85,
    ),
    (
        r"(?i)\b((?:[a-z][a-z0-9]*-)+(?:service|svc|api|gateway|worker|frontend|backend|proxy))\b",
        EntityType::Service,
        0.85,
    ),
    (
        r"(?i)\b((?:[a-z][a-z0-9]*-)+(?:db|database|cache|redis|postgres|mysql|mongo|kafka|queue))\b",
        EntityType::Database,
        0.85,
    ),
    (
        r"(?i)\b((?:host|node|vm)-[a-z0-9]+(?:-[a-z0-9]+)*)\b",
        EntityType::Host,
        0.8,
    ),
    (r"\b(\d{1,3}(?:\.\d{1,3}){3})\b", EntityType::Host, 0.8),
    // Bare numbers are not status codes: "latency 450 ms" must not match.
    (
        r"(?i)\b(?:http|status)(?:\s+code)?\s*[:=]?\s*([45]\d{2})\b",
        EntityType::ErrorCode,
        0.75,
    ),
    (r"(?i)\b([45]\d{2})\s+errors?\b", EntityType::ErrorCode, 0.75),
    (
        r"\b([A-Z][A-Za-z0-9]*(?:Exception|Error))\b",
        EntityType::ErrorCode,
        0.75,
    ),
];

/// Metric vocabulary: surface phrase -> canonical metric name.
const METRIC_VOCABULARY: [(&str, &str); 22] = [
    ("cpu", "cpu"),
    ("processor", "cpu"),
    ("memory", "memory"),
    ("mem", "memory"),
    ("oom", "memory"),
    ("heap", "memory"),
    ("latency", "latency"),
    ("response time", "latency"),
    ("p99", "latency"),
    ("disk", "disk"),
    ("iops", "disk"),
    ("error rate", "error_rate"),
    ("5xx", "error_rate"),
    ("throughput", "throughput"),
    ("qps", "throughput"),
    ("rps", "throughput"),
    ("connections", "connections"),
    ("connection pool", "connections"),
    ("gc", "gc"),
    ("garbage collection", "gc"),
    ("bandwidth", "network"),
    ("packet loss", "network"),
];

/// Deterministic pattern + dictionary entity extraction.
pub struct EntityExtractor {
    patterns: Vec<(Regex, EntityType, f32)>,
    metrics: Vec<(Regex, &'static str)>,
    dictionary: Vec<(Regex, String, EntityType)>,
}

impl EntityExtractor {
    pub fn new() -> Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(raw, ty, conf)| compile(raw).map(|re| (re, *ty, *conf)))
            .collect::<Result<Vec<_>>>()?;
        let metrics = METRIC_VOCABULARY
            .iter()
            .map(|(phrase, canonical)| {
                compile(&format!(r"(?i)\b{}\b", regex::escape(phrase))).map(|re| (re, *canonical))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            metrics,
            dictionary: Vec::new(),
        })
    }

    /// Add known names (typically graph node names) matched as whole words.
    pub fn with_dictionary(
        mut self,
        entries: impl IntoIterator<Item = (String, EntityType)>,
    ) -> Result<Self> {
        for (name, ty) in entries {
            let name = name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            let re = compile(&format!(r"(?i)(?:^|[^A-Za-z0-9_-]){}(?:$|[^A-Za-z0-9_-])", regex::escape(&name)))?;
            self.dictionary.push((re, name, ty));
        }
        Ok(self)
    }

    /// Entities found in `text`, sorted by name, one per name (highest confidence wins).
    #[must_use]
    pub fn extract(&self, text: &str) -> Vec<Entity> {
        let mut found: BTreeMap<String, Entity> = BTreeMap::new();

        for (re, name, ty) in &self.dictionary {
            if re.is_match(text) {
                merge(&mut found, name.to_lowercase(), *ty, DICTIONARY_CONFIDENCE);
            }
        }

        for (re, ty, conf) in &self.patterns {
            for caps in re.captures_iter(text) {
                let Some(m) = caps.get(1) else {
                    continue;
                };
                let name = match ty {
                    EntityType::ErrorCode if m.as_str().chars().all(|c| c.is_ascii_digit()) => {
                        format!("HTTP {}", m.as_str())
                    }
                    EntityType::ErrorCode => m.as_str().to_string(),
                    _ => m.as_str().to_lowercase(),
                };
                merge(&mut found, name, *ty, *conf);
            }
        }

        for (re, canonical) in &self.metrics {
            if re.is_match(text) {
                merge(&mut found, (*canonical).to_string(), EntityType::Metric, METRIC_CONFIDENCE);
            }
        }

        found.into_values().collect()
    }
}

fn compile(raw: &str) -> Result<Regex> {
    Regex::new(raw).map_err(|err| GraphError::InvalidPattern(format!("{raw}: {err}")))
}

fn merge(found: &mut BTreeMap<String, Entity>, name: String, ty: EntityType, confidence: f32) {
    match found.get_mut(&name) {
        Some(existing) if existing.confidence >= confidence => {}
        Some(existing) => {
            existing.entity_type = ty;
            existing.confidence = confidence;
        }
        None => {
            found.insert(
                name.clone(),
                Entity {
                    name,
                    entity_type: ty,
                    confidence,
                },
            );
        }
    }
}
