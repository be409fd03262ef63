use syncoor_domain::{Report, SyncProgressEntry};

/// Render a persisted report (and optional sibling progress series) as
/// markdown, for ad-hoc inspection on the command line.
pub fn render_report_markdown(report: &Report, progress: Option<&[SyncProgressEntry]>) -> String {
    let mut out = String::new();

    out.push_str(&format!("# Sync report: {}\n\n", report.run_id));
    out.push_str(&format!("- network: {}\n", report.network));
    out.push_str(&format!("- timestamp: {}\n", report.timestamp));
    out.push_str(&format!(
        "- execution: {} ({})\n",
        if report.exec.name.is_empty() { "unknown" } else { &report.exec.name },
        if report.exec.image.is_empty() { "unknown image" } else { &report.exec.image }
    ));
    out.push_str(&format!(
        "- consensus: {} ({})\n",
        if report.cons.name.is_empty() { "unknown" } else { &report.cons.name },
        if report.cons.image.is_empty() { "unknown image" } else { &report.cons.image }
    ));
    out.push_str(&format!("- **status**: {}\n", report.sync_status.status.as_str()));
    if !report.sync_status.status_message.is_empty() {
        out.push_str(&format!("- message: {}\n", report.sync_status.status_message));
    }
    out.push_str(&format!("- final block: {}\n", report.sync_status.final_block));
    out.push_str(&format!("- final slot: {}\n", report.sync_status.final_slot));

    if !report.labels.is_empty() {
        out.push_str("\n## Labels\n\n");
        for (k, v) in &report.labels {
            out.push_str(&format!("- `{k}` = `{v}`\n"));
        }
    }

    if let Some(entries) = progress {
        if !entries.is_empty() {
            out.push_str("\n## Progress\n\n");
            out.push_str("| time | block | slot | exec peers | cons peers |\n");
            out.push_str("|---|---|---|---|---|\n");
            for e in entries {
                out.push_str(&format!("| {} | {} | {} | {} | {} |\n", e.t, e.b, e.s, e.pe, e.pc));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncoor_domain::RunId;

    #[test]
    fn renders_basic_fields() {
        let report = Report::new(RunId::new("run-1"), 1000, "hoodi");
        let md = render_report_markdown(&report, None);
        assert!(md.contains("run-1"));
        assert!(md.contains("hoodi"));
        assert!(md.contains("**status**: running"));
    }

    #[test]
    fn renders_progress_table_when_present() {
        let report = Report::new(RunId::new("run-1"), 1000, "hoodi");
        let progress = vec![SyncProgressEntry { t: 1000, b: 10, s: 20, de: 0, dc: 0, pe: 3, pc: 4 }];
        let md = render_report_markdown(&report, Some(&progress));
        assert!(md.contains("| 1000 | 10 | 20 | 3 | 4 |"));
    }

    #[test]
    fn omits_progress_section_when_empty() {
        let report = Report::new(RunId::new("run-1"), 1000, "hoodi");
        let md = render_report_markdown(&report, Some(&[]));
        assert!(!md.contains("## Progress"));
    }
}
