use crate::completion::{narrate, CompletionClient, CompletionConfig, CompletionRequest};
use crate::error::Result;
use crate::model::{Hypothesis, KnowledgeSummary, Symptom};
use crate::rules::{matches_keyword, CauseRule, RuleSet};
use crate::state::{AnalysisState, HYPOTHESES_KEY, KNOWLEDGE_KEY};
use rootcause_protocol::StageName;
use rootcause_search::EvidenceItem;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Evidence-only symptoms count half as much as symptoms named in the incident text.
const EVIDENCE_ONLY_STRENGTH: f32 = 0.5;

/// Symptom derivation and rule-driven root-cause hypotheses.
pub struct Reasoning {
    rules: Arc<RuleSet>,
    completion: Option<Arc<dyn CompletionClient>>,
    completion_config: CompletionConfig,
}

impl Reasoning {
    #[must_use]
    pub fn new(
        rules: Arc<RuleSet>,
        completion: Option<Arc<dyn CompletionClient>>,
        completion_config: CompletionConfig,
    ) -> Self {
        Self {
            rules,
            completion,
            completion_config,
        }
    }

    #[must_use]
    pub fn derive_symptoms(&self, input: &str, evidence: &[EvidenceItem]) -> Vec<Symptom> {
        let query = input.to_lowercase();
        let evidence_texts: Vec<String> = evidence
            .iter()
            .map(|e| format!("{} {}", e.title, e.text).to_lowercase())
            .collect();

        self.rules
            .reasoning
            .symptoms
            .iter()
            .filter_map(|rule| {
                let in_query: Vec<String> = rule
                    .keywords
                    .iter()
                    .filter(|k| matches_keyword(&query, k))
                    .map(|k| k.trim_end_matches('$').to_string())
                    .collect();
                if !in_query.is_empty() {
                    return Some(Symptom {
                        name: rule.name.clone(),
                        category: rule.category.clone(),
                        matched_keywords: in_query,
                        from_query: true,
                    });
                }
                let in_evidence: Vec<String> = rule
                    .keywords
                    .iter()
                    .filter(|k| evidence_texts.iter().any(|t| matches_keyword(t, k)))
                    .map(|k| k.trim_end_matches('$').to_string())
                    .collect();
                (!in_evidence.is_empty()).then(|| Symptom {
                    name: rule.name.clone(),
                    category: rule.category.clone(),
                    matched_keywords: in_evidence,
                    from_query: false,
                })
            })
            .collect()
    }

    /// Ranked hypotheses: confidence, then evidence count, then mean fused score, then cause id.
    #[must_use]
    pub fn hypothesize(&self, input: &str, knowledge: &KnowledgeSummary) -> Vec<Hypothesis> {
        let symptoms = self.derive_symptoms(input, &knowledge.evidence);
        let present: HashMap<&str, &Symptom> =
            symptoms.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut hypotheses: Vec<Hypothesis> = self
            .rules
            .reasoning
            .causes
            .iter()
            .filter_map(|cause| self.score_cause(cause, &present, knowledge))
            .collect();

        hypotheses.sort_by(hypothesis_order);
        hypotheses
    }

    pub async fn process(&self, state: &AnalysisState) -> Result<AnalysisState> {
        let knowledge: KnowledgeSummary = state.context(StageName::Reasoning, KNOWLEDGE_KEY)?;
        let mut hypotheses = self.hypothesize(&state.input_text, &knowledge);

        if let Some(top) = hypotheses.first_mut() {
            let request = CompletionRequest {
                stage: StageName::Reasoning,
                purpose: "hypothesis_narrative".to_string(),
                input: serde_json::json!({
                    "incident": state.input_text,
                    "cause": top.candidate_cause,
                    "symptoms": top.symptom_set,
                    "confidence": top.confidence,
                }),
                max_chars: self.completion_config.max_chars,
            };
            top.narrative =
                narrate(self.completion.as_deref(), &self.completion_config, request).await?;
        }

        let mut next = state.clone();
        let message = match hypotheses.first() {
            Some(top) => format!(
                "{} hypotheses; leading: {} ({:.2})",
                hypotheses.len(),
                top.cause_id,
                top.confidence
            ),
            None => "no hypothesis matched the observed symptoms".to_string(),
        };
        next.append_message(StageName::Reasoning, message);
        next.publish(StageName::Reasoning, HYPOTHESES_KEY, &hypotheses)?;
        next.finish_step();
        Ok(next)
    }

    fn score_cause(
        &self,
        cause: &CauseRule,
        present: &HashMap<&str, &Symptom>,
        knowledge: &KnowledgeSummary,
    ) -> Option<Hypothesis> {
        let rules = &self.rules.reasoning;

        let matched: Vec<&Symptom> = cause
            .symptoms
            .iter()
            .filter_map(|name| present.get(name.as_str()).copied())
            .collect();
        if matched.is_empty() {
            return None;
        }
        let strength: f32 = matched
            .iter()
            .map(|s| if s.from_query { 1.0 } else { EVIDENCE_ONLY_STRENGTH })
            .sum();
        let rule_match = cause.weight * strength / cause.symptoms.len() as f32;

        let keywords: Vec<&str> = rules
            .symptoms
            .iter()
            .filter(|s| cause.symptoms.contains(&s.name))
            .flat_map(|s| s.keywords.iter().map(String::as_str))
            .collect();
        let supporting: Vec<&EvidenceItem> = knowledge
            .evidence
            .iter()
            .filter(|item| {
                let text = format!("{} {}", item.title, item.text).to_lowercase();
                keywords.iter().any(|k| matches_keyword(&text, k))
            })
            .collect();
        let support = (supporting.len() as f32 / rules.evidence_saturation as f32).min(1.0);
        let mean_fused_score = if supporting.is_empty() {
            0.0
        } else {
            supporting.iter().map(|e| e.fused_score).sum::<f32>() / supporting.len() as f32
        };

        let proximity = knowledge
            .topology
            .nodes
            .iter()
            .filter(|n| cause.targets.contains(&n.entity_type))
            .map(|n| 1.0 / (1.0 + n.distance as f32))
            .fold(0.0f32, f32::max);

        let w = rules.weights;
        let total = w.rule_match + w.evidence + w.topology;
        let confidence =
            ((w.rule_match * rule_match + w.evidence * support + w.topology * proximity) / total)
                .clamp(0.0, 1.0);

        Some(Hypothesis {
            cause_id: cause.id.clone(),
            category: cause.category.clone(),
            candidate_cause: cause.description.clone(),
            symptom_set: matched.iter().map(|s| s.name.clone()).collect(),
            confidence,
            supporting_evidence_ids: supporting.iter().map(|e| e.id.clone()).collect(),
            mean_fused_score,
            narrative: None,
        })
    }
}

fn hypothesis_order(a: &Hypothesis, b: &Hypothesis) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| {
            b.supporting_evidence_ids
                .len()
                .cmp(&a.supporting_evidence_ids.len())
        })
        .then_with(|| b.mean_fused_score.total_cmp(&a.mean_fused_score))
        .then_with(|| a.cause_id.cmp(&b.cause_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcause_evidence_store::SourceKind;
    use rootcause_graph::{EntityType, TopologyNode, TopologySnapshot};
    use rootcause_search::QueryClass;

    fn reasoning() -> Reasoning {
        Reasoning::new(
            Arc::new(RuleSet::builtin().unwrap()),
            None,
            CompletionConfig::default(),
        )
    }

    fn item(id: &str, text: &str, fused: f32) -> EvidenceItem {
        EvidenceItem {
            id: id.to_string(),
            title: String::new(),
            text: text.to_string(),
            source_kind: SourceKind::Log,
            vector_score: None,
            lexical_score: Some(1.0),
            fused_score: fused,
            timestamp_ms: 1,
            origin: "logs/app.log".to_string(),
            content_hash: id.to_string(),
        }
    }

    fn knowledge(evidence: Vec<EvidenceItem>, nodes: Vec<TopologyNode>) -> KnowledgeSummary {
        KnowledgeSummary {
            entities: Vec::new(),
            topology: TopologySnapshot {
                nodes,
                ..TopologySnapshot::default()
            },
            evidence,
            query_class: QueryClass::Mixed,
            degraded_branches: Vec::new(),
        }
    }

    #[test]
    fn cpu_incident_yields_resource_hypothesis_first() {
        let service_b = TopologyNode {
            name: "service-b".to_string(),
            entity_type: EntityType::Service,
            distance: 0,
            attributes: Default::default(),
        };
        let k = knowledge(
            vec![item("e1", "cpu throttling on service-b pods", 0.9)],
            vec![service_b],
        );
        let hypotheses = reasoning().hypothesize("service-b CPU usage spiking, responses timing out", &k);

        let top = &hypotheses[0];
        assert_eq!(top.cause_id, "cpu-exhaustion");
        assert_eq!(top.category, "resource");
        assert_eq!(top.supporting_evidence_ids, vec!["e1".to_string()]);
        assert!(top.confidence > 0.0 && top.confidence <= 1.0);
    }

    #[test]
    fn evidence_only_symptoms_are_weaker() {
        let r = reasoning();
        let evidence = vec![item("e1", "disk full errors on host-3", 0.5)];
        let named = r.hypothesize("disk full errors", &knowledge(evidence.clone(), Vec::new()));
        let inferred = r.hypothesize("something is wrong", &knowledge(evidence.clone(), Vec::new()));

        let symptoms = r.derive_symptoms("something is wrong", &evidence);
        assert!(!symptoms.is_empty());
        assert!(symptoms.iter().all(|s| !s.from_query));

        let named = named.iter().find(|h| h.cause_id == "disk-exhaustion").unwrap();
        let inferred = inferred.iter().find(|h| h.cause_id == "disk-exhaustion").unwrap();
        assert!(named.confidence > inferred.confidence);
    }

    #[test]
    fn ties_break_on_evidence_count_then_fused_then_id() {
        let base = Hypothesis {
            cause_id: "b".to_string(),
            category: "resource".to_string(),
            candidate_cause: String::new(),
            symptom_set: Vec::new(),
            confidence: 0.5,
            supporting_evidence_ids: vec!["x".to_string()],
            mean_fused_score: 0.4,
            narrative: None,
        };
        let more_evidence = Hypothesis {
            cause_id: "z".to_string(),
            supporting_evidence_ids: vec!["x".to_string(), "y".to_string()],
            ..base.clone()
        };
        let higher_fused = Hypothesis {
            cause_id: "y".to_string(),
            mean_fused_score: 0.9,
            ..base.clone()
        };
        let lower_id = Hypothesis {
            cause_id: "a".to_string(),
            ..base.clone()
        };
        let mut all = vec![base, lower_id, higher_fused, more_evidence];
        all.sort_by(hypothesis_order);
        let ids: Vec<&str> = all.iter().map(|h| h.cause_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "y", "a", "b"]);
    }

    #[test]
    fn no_symptoms_no_hypotheses() {
        let hypotheses = reasoning().hypothesize("hello there", &knowledge(Vec::new(), Vec::new()));
        assert!(hypotheses.is_empty());
    }
}
