use tagsync_core::pipeline::Inspection;
use tagsync_core::regroup::RegroupReport;
use tagsync_core::stats::StatsSnapshot;
use tagsync_core::RunSummary;

fn stats_line(label: &str, stats: &Option<StatsSnapshot>) -> String {
    match stats {
        Some(s) => format!(
            "{label}: total {}, success {}, fail {}, skip {}",
            s.total, s.success, s.fail, s.skip
        ),
        None => format!("{label}: disabled"),
    }
}

pub fn regroup_line(report: &RegroupReport) -> String {
    format!(
        "artist tags: regrouped {} under parent {}",
        report.regrouped, report.parent_id
    )
}

pub fn render_summary(summary: &RunSummary) -> String {
    let mut lines = vec![
        format!(
            "sync ({} schema): {} files in {} ms",
            summary.variant, summary.files, summary.elapsed_ms
        ),
        stats_line("tags", &summary.tags),
        stats_line("notes", &summary.notes),
    ];
    if let Some(report) = &summary.regroup {
        lines.push(regroup_line(report));
    }
    let pending = &summary.unflushed;
    if !pending.is_empty() {
        lines.push(format!(
            "unflushed rows: tags {}, associations {}, notes {}",
            pending.tags, pending.associations, pending.notes
        ));
    }
    lines.join("\n")
}

pub fn render_inspection(inspection: &Inspection) -> String {
    let c = &inspection.counts;
    format!(
        "{} schema: {} files, {} tags, {} associations, {} notes",
        inspection.variant, c.files, c.tags, c.associations, c.notes
    )
}
