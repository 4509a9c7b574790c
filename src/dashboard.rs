//! Plain HTML status page.

use crate::models::{ErrorRecord, HistoryReport, StatusReport};
use std::fmt::Write;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn opt(value: Option<&str>) -> String {
    value.map(escape).unwrap_or_else(|| "-".to_string())
}

/// Render current status, recent runs and recent errors as a single page.
pub fn render_dashboard(
    status: &StatusReport,
    history: &HistoryReport,
    errors: &[ErrorRecord],
) -> String {
    let mut html = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Cache warmer</title></head><body>\n\
         <h1>Cache warmer</h1>\n<p>Last updated: {}</p>\n",
        status.last_updated.to_rfc3339()
    );

    html.push_str(
        "<h2>Regions</h2>\n<table border=\"1\">\n<tr><th>Region</th><th>Target</th>\
         <th>Progress</th><th>Last run</th><th>Success</th><th>Failed</th>\
         <th>Hit rate</th><th>Location match</th><th>Region match</th></tr>\n",
    );
    for (label, region) in &status.regions {
        match &region.stats {
            Some(stats) => {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                     <td>{}%</td><td>{}%</td><td>{}</td></tr>",
                    escape(label),
                    escape(&region.representative_code),
                    escape(&region.current_progress),
                    stats.timestamp.to_rfc3339(),
                    stats.success,
                    stats.failed,
                    escape(&stats.hit_rate),
                    escape(&stats.location_match_rate),
                    opt(stats.region_match_rate.as_deref()),
                );
            }
            None => {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td colspan=\"6\">No runs yet</td></tr>",
                    escape(label),
                    escape(&region.representative_code),
                    escape(&region.current_progress),
                );
            }
        }
    }
    html.push_str("</table>\n");

    let totals = &history.totals;
    let _ = writeln!(
        html,
        "<h2>Recent runs</h2>\n<p>{} runs, {} succeeded, {} failed, average hit rate {}%</p>",
        totals.executions,
        totals.total_success,
        totals.total_failed,
        escape(&totals.average_hit_rate)
    );
    html.push_str(
        "<table border=\"1\">\n<tr><th>Time</th><th>Region</th><th>Mode</th><th>URLs</th>\
         <th>Hits</th><th>Misses</th><th>Expired</th><th>Hit rate</th><th>Duration (ms)</th></tr>\n",
    );
    for run in &history.results {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{:?}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}%</td><td>{}</td></tr>",
            run.timestamp.to_rfc3339(),
            escape(&run.region),
            run.mode,
            run.urls_processed,
            run.cache_hits,
            run.cache_misses,
            run.cache_expired,
            escape(&run.hit_rate),
            run.duration_ms,
        );
    }
    html.push_str("</table>\n");

    if !errors.is_empty() {
        html.push_str("<h2>Recent errors</h2>\n<ul>\n");
        for error in errors {
            let _ = writeln!(
                html,
                "<li>{} [{}] {}</li>",
                error.timestamp.to_rfc3339(),
                escape(&error.region),
                escape(&error.message)
            );
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HistoryTotals, RegionStatus};
    use chrono::Utc;
    use std::collections::BTreeMap;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_renders_regions_without_runs() {
        let mut regions = BTreeMap::new();
        regions.insert(
            "R&D <lab>".to_string(),
            RegionStatus {
                stats: None,
                current_progress: "0".to_string(),
                representative_code: "LAB".to_string(),
            },
        );
        let status = StatusReport {
            last_updated: Utc::now(),
            regions,
        };
        let history = HistoryReport {
            totals: HistoryTotals::from_results(&[]),
            results: Vec::new(),
            regions: vec!["R&D <lab>".to_string()],
        };
        let errors = vec![ErrorRecord {
            region: "system".to_string(),
            message: "worker <down>".to_string(),
            stack: None,
            timestamp: Utc::now(),
        }];

        let html = render_dashboard(&status, &history, &errors);
        assert!(html.contains("R&amp;D &lt;lab&gt;"));
        assert!(html.contains("No runs yet"));
        assert!(html.contains("0 runs"));
        assert!(html.contains("worker &lt;down&gt;"));
        assert!(!html.contains("<lab>"));
    }
}
