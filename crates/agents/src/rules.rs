use crate::error::{Result, StageError};
use crate::model::{PlanStep, RiskLevel};
use rootcause_graph::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const BUILTIN_RULES: &str = include_str!("../rules/default.toml");

/// Planner taxonomy, reasoning rules and executor templates, loaded as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: String,
    pub planner: PlannerRules,
    pub reasoning: ReasoningRules,
    pub executor: ExecutorRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerRules {
    pub default_problem_type: String,
    pub default_priority: String,
    pub max_keywords: usize,
    #[serde(default)]
    pub stopwords: Vec<String>,
    pub complexity: ComplexityRules,
    #[serde(default)]
    pub priorities: Vec<PriorityRule>,
    pub problem_types: Vec<ProblemTypeRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityRules {
    pub medium_min_signals: usize,
    pub high_min_signals: usize,
}

/// First level (in table order) with a matching pattern wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityRule {
    pub level: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemTypeRule {
    pub name: String,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRules {
    pub categories: Vec<String>,
    /// Supporting items at which evidence support saturates
    pub evidence_saturation: usize,
    pub weights: ConfidenceWeights,
    pub symptoms: Vec<SymptomRule>,
    pub causes: Vec<CauseRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub rule_match: f32,
    pub evidence: f32,
    pub topology: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomRule {
    pub name: String,
    pub category: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseRule {
    pub id: String,
    pub category: String,
    pub description: String,
    pub symptoms: Vec<String>,
    pub weight: f32,
    /// Entity types whose graph proximity supports this cause
    #[serde(default)]
    pub targets: Vec<EntityType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorRules {
    /// Effort that normalises to a time cost of 1.0
    pub max_effort_hours: f32,
    pub templates: Vec<SolutionTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionTemplate {
    pub category: String,
    pub action: String,
    pub risk_level: RiskLevel,
    pub estimated_effort: String,
    pub effort_hours: f32,
    pub feasibility: f32,
    pub impact: f32,
}

impl RuleSet {
    /// Rule tables compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_RULES)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let rules: Self = toml::from_str(raw)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| StageError::RuleTable(format!("{}: {err}", path.display())))?;
        let rules = Self::from_toml(&raw)?;
        log::info!(
            "Loaded rule tables {} from {}",
            rules.version,
            path.display()
        );
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return invalid("version must not be empty");
        }
        self.planner.validate()?;
        self.reasoning.validate()?;
        self.executor.validate(&self.reasoning.categories)?;
        Ok(())
    }

    #[must_use]
    pub fn templates_for(&self, category: &str) -> Vec<&SolutionTemplate> {
        self.executor
            .templates
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }
}

impl PlannerRules {
    fn validate(&self) -> Result<()> {
        if self.problem_types.is_empty() {
            return invalid("planner.problem_types must not be empty");
        }
        if !self
            .problem_types
            .iter()
            .any(|p| p.name == self.default_problem_type)
        {
            return invalid(format!(
                "planner.default_problem_type `{}` is not a declared problem type",
                self.default_problem_type
            ));
        }
        if self.max_keywords == 0 {
            return invalid("planner.max_keywords must be > 0");
        }
        if self.complexity.medium_min_signals > self.complexity.high_min_signals {
            return invalid("planner.complexity.medium_min_signals cannot exceed high_min_signals");
        }
        Ok(())
    }
}

impl ReasoningRules {
    fn validate(&self) -> Result<()> {
        let categories: HashSet<&str> = self.categories.iter().map(String::as_str).collect();
        let mut symptom_names = HashSet::new();
        for symptom in &self.symptoms {
            if !categories.contains(symptom.category.as_str()) {
                return invalid(format!(
                    "symptom `{}` references unknown category `{}`",
                    symptom.name, symptom.category
                ));
            }
            if symptom.keywords.is_empty() {
                return invalid(format!("symptom `{}` has no keywords", symptom.name));
            }
            if !symptom_names.insert(symptom.name.as_str()) {
                return invalid(format!("duplicate symptom `{}`", symptom.name));
            }
        }

        let mut cause_ids = HashSet::new();
        for cause in &self.causes {
            if !categories.contains(cause.category.as_str()) {
                return invalid(format!(
                    "cause `{}` references unknown category `{}`",
                    cause.id, cause.category
                ));
            }
            if let Some(missing) = cause
                .symptoms
                .iter()
                .find(|s| !symptom_names.contains(s.as_str()))
            {
                return invalid(format!(
                    "cause `{}` references unknown symptom `{missing}`",
                    cause.id
                ));
            }
            if cause.symptoms.is_empty() {
                return invalid(format!("cause `{}` lists no symptoms", cause.id));
            }
            check_unit(&format!("cause `{}` weight", cause.id), cause.weight)?;
            if !cause_ids.insert(cause.id.as_str()) {
                return invalid(format!("duplicate cause `{}`", cause.id));
            }
        }

        let w = self.weights;
        for (name, value) in [
            ("rule_match", w.rule_match),
            ("evidence", w.evidence),
            ("topology", w.topology),
        ] {
            check_unit(&format!("reasoning.weights.{name}"), value)?;
        }
        if w.rule_match + w.evidence + w.topology <= f32::EPSILON {
            return invalid("reasoning.weights must not all be zero");
        }
        if self.evidence_saturation == 0 {
            return invalid("reasoning.evidence_saturation must be > 0");
        }
        Ok(())
    }
}

impl ExecutorRules {
    fn validate(&self, categories: &[String]) -> Result<()> {
        if self.max_effort_hours.is_nan() || self.max_effort_hours <= 0.0 {
            return invalid("executor.max_effort_hours must be > 0");
        }
        for template in &self.templates {
            if !categories.contains(&template.category) {
                return invalid(format!(
                    "template `{}` references unknown category `{}`",
                    template.action, template.category
                ));
            }
            check_unit(&format!("`{}` feasibility", template.action), template.feasibility)?;
            check_unit(&format!("`{}` impact", template.action), template.impact)?;
            if template.effort_hours.is_nan() || template.effort_hours < 0.0 {
                return invalid(format!("`{}` effort_hours must be >= 0", template.action));
            }
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        invalid(format!("{name} must be within [0, 1], got {value}"))
    }
}

fn invalid<T>(message: impl Into<String>) -> Result<T> {
    Err(StageError::RuleTable(message.into()))
}

/// Case-insensitive keyword match anchored at a word start ("spik" matches "spiking",
/// "down" does not match "slowdown"). A trailing `$` also anchors the word end, so
/// "down$" matches "api is down" but not "downstream".
#[must_use]
pub fn matches_keyword(haystack_lower: &str, keyword: &str) -> bool {
    let (keyword, whole_word) = match keyword.strip_suffix('$') {
        Some(stem) => (stem, true),
        None => (keyword, false),
    };
    let needle = keyword.to_lowercase();
    if needle.is_empty() {
        return false;
    }
    haystack_lower.match_indices(&needle).any(|(idx, _)| {
        let starts_word = haystack_lower[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let ends_word = !whole_word
            || haystack_lower[idx + needle.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
        starts_word && ends_word
    })
}
