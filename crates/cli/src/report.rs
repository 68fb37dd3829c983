use rootcause_agents::AnalysisReport;
use rootcause_protocol::TaskSnapshot;
use std::fmt::Write;

/// Plain-text rendering of a terminal task snapshot.
pub fn render_snapshot(snapshot: &TaskSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Task {} {} (progress {:.0}%)",
        snapshot.task_id,
        snapshot.status,
        snapshot.progress * 100.0
    );

    for record in &snapshot.stage_statuses {
        let _ = write!(
            out,
            "  {:<10} {:<10} attempts {}",
            record.stage.as_str(),
            record.status,
            record.attempts
        );
        if let Some(summary) = &record.summary {
            let _ = write!(out, "  {summary}");
        }
        out.push('\n');
    }

    if let Some(reason) = &snapshot.interrupt_reason {
        let _ = writeln!(out, "Interrupted: {reason}");
    }
    if let Some(error) = &snapshot.error {
        let stage = error.stage.map_or("-", |s| s.as_str());
        let _ = writeln!(out, "Error [{}] at {stage}: {}", error.class, error.message);
    }

    let report = snapshot
        .final_result
        .as_ref()
        .and_then(|value| serde_json::from_value::<AnalysisReport>(value.clone()).ok());
    if let Some(report) = report {
        render_report(&mut out, &report);
    }
    out.trim_end().to_string()
}

fn render_report(out: &mut String, report: &AnalysisReport) {
    let _ = writeln!(
        out,
        "Plan {} ({}, priority {}), {} evidence records",
        report.plan.plan_id, report.plan.problem_type, report.plan.priority, report.evidence_count
    );
    if !report.entities.is_empty() {
        let names: Vec<&str> = report.entities.iter().map(|e| e.name.as_str()).collect();
        let _ = writeln!(out, "Entities: {}", names.join(", "));
    }

    let _ = writeln!(out, "Hypotheses:");
    for (idx, hypothesis) in report.hypotheses.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} [{}] confidence {:.2}, evidence {}",
            idx + 1,
            hypothesis.candidate_cause,
            hypothesis.category,
            hypothesis.confidence,
            hypothesis.supporting_evidence_ids.join(", ")
        );
    }

    let _ = writeln!(out, "Recommendations:");
    for (idx, rec) in report.recommendations.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. {} (risk {}, effort {}, score {:.2})",
            idx + 1,
            rec.action,
            rec.risk_level,
            rec.estimated_effort,
            rec.composite_score
        );
    }
}
