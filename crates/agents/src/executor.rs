use crate::completion::{narrate, CompletionClient, CompletionConfig, CompletionRequest};
use crate::error::Result;
use crate::model::{Hypothesis, Recommendation};
use crate::rules::{RuleSet, SolutionTemplate};
use crate::state::{AnalysisState, HYPOTHESES_KEY, RECOMMENDATIONS_KEY};
use rootcause_protocol::StageName;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps leading hypotheses to scored remediation actions.
pub struct Executor {
    rules: Arc<RuleSet>,
    top_hypotheses: usize,
    completion: Option<Arc<dyn CompletionClient>>,
    completion_config: CompletionConfig,
}

impl Executor {
    #[must_use]
    pub fn new(
        rules: Arc<RuleSet>,
        top_hypotheses: usize,
        completion: Option<Arc<dyn CompletionClient>>,
        completion_config: CompletionConfig,
    ) -> Self {
        Self {
            rules,
            top_hypotheses,
            completion,
            completion_config,
        }
    }

    /// `0.3·feasibility + 0.4·impact + 0.2·(1 - risk) + 0.1·(1 - time_cost)`, scaled by
    /// hypothesis confidence.
    #[must_use]
    pub fn composite_score(&self, template: &SolutionTemplate, confidence: f32) -> f32 {
        let time_cost = (template.effort_hours / self.rules.executor.max_effort_hours).clamp(0.0, 1.0);
        let base = 0.3 * template.feasibility
            + 0.4 * template.impact
            + 0.2 * (1.0 - template.risk_level.score())
            + 0.1 * (1.0 - time_cost);
        (base * confidence.clamp(0.0, 1.0)).clamp(0.0, 1.0)
    }

    /// Sorted by composite score descending, then lower risk, then action text.
    #[must_use]
    pub fn recommend(&self, hypotheses: &[Hypothesis]) -> Vec<Recommendation> {
        // One entry per action: the best-scoring hypothesis keeps it.
        let mut by_action: HashMap<&str, Recommendation> = HashMap::new();

        for hypothesis in hypotheses.iter().take(self.top_hypotheses) {
            for template in self.rules.templates_for(&hypothesis.category) {
                let recommendation = Recommendation {
                    action: template.action.clone(),
                    category: template.category.clone(),
                    hypothesis_id: hypothesis.cause_id.clone(),
                    risk_level: template.risk_level,
                    estimated_effort: template.estimated_effort.clone(),
                    feasibility: template.feasibility,
                    impact: template.impact,
                    composite_score: self.composite_score(template, hypothesis.confidence),
                    rationale: None,
                };
                let replace = by_action
                    .get(template.action.as_str())
                    .map_or(true, |existing| {
                        recommendation_order(existing, &recommendation) == Ordering::Greater
                    });
                if replace {
                    by_action.insert(template.action.as_str(), recommendation);
                }
            }
        }

        let mut recommendations: Vec<Recommendation> = by_action.into_values().collect();
        recommendations.sort_by(recommendation_order);
        recommendations
    }

    pub async fn process(&self, state: &AnalysisState) -> Result<AnalysisState> {
        let hypotheses: Vec<Hypothesis> = state.context(StageName::Executor, HYPOTHESES_KEY)?;
        let mut recommendations = self.recommend(&hypotheses);

        if let Some(top) = recommendations.first_mut() {
            let request = CompletionRequest {
                stage: StageName::Executor,
                purpose: "recommendation_rationale".to_string(),
                input: serde_json::json!({
                    "incident": state.input_text,
                    "action": top.action,
                    "hypothesis": top.hypothesis_id,
                    "risk_level": top.risk_level,
                }),
                max_chars: self.completion_config.max_chars,
            };
            top.rationale =
                narrate(self.completion.as_deref(), &self.completion_config, request).await?;
        }

        let mut next = state.clone();
        let message = match recommendations.first() {
            Some(top) => format!(
                "{} recommendations; top: {} ({:.2})",
                recommendations.len(),
                top.action,
                top.composite_score
            ),
            None => "no recommendation: no actionable hypothesis".to_string(),
        };
        next.append_message(StageName::Executor, message);
        next.publish(StageName::Executor, RECOMMENDATIONS_KEY, &recommendations)?;
        next.finish_step();
        Ok(next)
    }
}

fn recommendation_order(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.composite_score
        .total_cmp(&a.composite_score)
        .then_with(|| a.risk_level.cmp(&b.risk_level))
        .then_with(|| a.action.cmp(&b.action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskLevel;

    fn executor() -> Executor {
        Executor::new(
            Arc::new(RuleSet::builtin().unwrap()),
            3,
            None,
            CompletionConfig::default(),
        )
    }

    fn hypothesis(id: &str, category: &str, confidence: f32) -> Hypothesis {
        Hypothesis {
            cause_id: id.to_string(),
            category: category.to_string(),
            candidate_cause: String::new(),
            symptom_set: Vec::new(),
            confidence,
            supporting_evidence_ids: Vec::new(),
            mean_fused_score: 0.0,
            narrative: None,
        }
    }

    #[test]
    fn composite_score_follows_weighted_formula() {
        let e = executor();
        let template = SolutionTemplate {
            category: "resource".to_string(),
            action: "scale".to_string(),
            risk_level: RiskLevel::Low,
            estimated_effort: "4 hours".to_string(),
            effort_hours: 4.0,
            feasibility: 1.0,
            impact: 0.5,
        };
        // 0.3 + 0.2 + 0.2 * 0.8 + 0.1 * 0.9 = 0.75, times confidence 0.8
        let score = e.composite_score(&template, 0.8);
        assert!((score - 0.6).abs() < 1e-5, "score = {score}");
    }

    #[test]
    fn recommendations_are_sorted_and_bounded() {
        let recs = executor().recommend(&[
            hypothesis("cpu-exhaustion", "resource", 0.75),
            hypothesis("downstream-latency", "latency", 0.4),
        ]);
        assert!(!recs.is_empty());
        for rec in &recs {
            assert!((0.0..=1.0).contains(&rec.composite_score));
        }
        for pair in recs.windows(2) {
            assert!(recommendation_order(&pair[0], &pair[1]) != Ordering::Greater);
        }
        assert_eq!(recs[0].hypothesis_id, "cpu-exhaustion");
    }

    #[test]
    fn only_top_hypotheses_are_mapped() {
        let e = Executor::new(
            Arc::new(RuleSet::builtin().unwrap()),
            1,
            None,
            CompletionConfig::default(),
        );
        let recs = e.recommend(&[
            hypothesis("cpu-exhaustion", "resource", 0.75),
            hypothesis("bad-deployment", "deployment", 0.7),
        ]);
        assert!(recs.iter().all(|r| r.category == "resource"));
    }

    #[test]
    fn equal_scores_prefer_lower_risk() {
        let low = Recommendation {
            action: "b".to_string(),
            category: "resource".to_string(),
            hypothesis_id: "h".to_string(),
            risk_level: RiskLevel::Low,
            estimated_effort: String::new(),
            feasibility: 0.5,
            impact: 0.5,
            composite_score: 0.5,
            rationale: None,
        };
        let high = Recommendation {
            action: "a".to_string(),
            risk_level: RiskLevel::High,
            ..low.clone()
        };
        assert_eq!(recommendation_order(&low, &high), Ordering::Less);
    }
}
