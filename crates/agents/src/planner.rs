use crate::error::{Result, StageError};
use crate::model::ExecutionPlan;
use crate::rules::{matches_keyword, RuleSet};
use crate::state::{AnalysisState, PLAN_KEY};
use rootcause_evidence_store::{normalize_text, tokenize};
use rootcause_protocol::StageName;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Rule-based problem classification and plan construction.
pub struct Planner {
    rules: Arc<RuleSet>,
}

impl Planner {
    #[must_use]
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Deterministic for a given input and rule-table version.
    pub fn plan(&self, input: &str) -> Result<ExecutionPlan> {
        let normalized = normalize_text(input);
        if normalized.is_empty() {
            return Err(StageError::logic(StageName::Planner, "incident text is empty"));
        }
        let rules = &self.rules.planner;

        let keywords = self.keywords(&normalized);

        let mut matched_types = 0usize;
        let mut best: Option<(&str, usize)> = None;
        for problem in &rules.problem_types {
            let hits = problem
                .patterns
                .iter()
                .filter(|p| matches_keyword(&normalized, p))
                .count();
            if hits == 0 {
                continue;
            }
            matched_types += 1;
            // Strictly greater: earlier table entries win ties
            if best.map_or(true, |(_, best_hits)| hits > best_hits) {
                best = Some((problem.name.as_str(), hits));
            }
        }
        let problem_type = best.map_or(rules.default_problem_type.as_str(), |(name, _)| name);

        let priority = rules
            .priorities
            .iter()
            .find(|p| p.patterns.iter().any(|pat| matches_keyword(&normalized, pat)))
            .map_or(rules.default_priority.as_str(), |p| p.level.as_str());

        let signals = keywords.len() + 2 * matched_types.saturating_sub(1);
        let complexity = if signals >= rules.complexity.high_min_signals {
            "high"
        } else if signals >= rules.complexity.medium_min_signals {
            "medium"
        } else {
            "low"
        };

        let steps = rules
            .problem_types
            .iter()
            .find(|p| p.name == problem_type && !p.steps.is_empty())
            .or_else(|| {
                rules
                    .problem_types
                    .iter()
                    .find(|p| p.name == rules.default_problem_type)
            })
            .map(|p| p.steps.clone())
            .unwrap_or_default();

        let seed = format!("{}\n{}", self.rules.version, normalized);
        let plan_id = Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string();

        Ok(ExecutionPlan {
            plan_id,
            problem_type: problem_type.to_string(),
            priority: priority.to_string(),
            complexity: complexity.to_string(),
            keywords,
            steps,
            rule_version: self.rules.version.clone(),
        })
    }

    pub async fn process(&self, state: &AnalysisState) -> Result<AnalysisState> {
        let plan = self.plan(&state.input_text)?;
        let mut next = state.clone();
        next.append_message(
            StageName::Planner,
            format!(
                "{} plan ({} priority, {} complexity) with {} steps",
                plan.problem_type,
                plan.priority,
                plan.complexity,
                plan.steps.len()
            ),
        );
        next.publish(StageName::Planner, PLAN_KEY, &plan)?;
        next.finish_step();
        Ok(next)
    }

    fn keywords(&self, normalized: &str) -> Vec<String> {
        let rules = &self.rules.planner;
        let stopwords: HashSet<&str> = rules.stopwords.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        tokenize(normalized)
            .into_iter()
            .filter(|t| !stopwords.contains(t.as_str()))
            .filter(|t| seen.insert(t.clone()))
            .take(rules.max_keywords)
            .collect()
    }
}
