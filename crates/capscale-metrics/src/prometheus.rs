//! Prometheus text exposition format.
//!
//! Renders collection capacity and throttle observations into the
//! Prometheus text exposition format for scraping.

use std::fmt::Write;

use capscale_core::ThrottleSummary;
use capscale_state::CollectionRecord;

/// Render collections and their current throttle summaries.
///
/// Produces GAUGE metrics with `collection` labels. Success-rate gauges are
/// omitted for windows without traffic.
pub fn render_prometheus(collections: &[(CollectionRecord, ThrottleSummary)]) -> String {
    let mut out = String::new();

    out.push_str("# HELP capscale_capacity Provisioned capacity units.\n");
    out.push_str("# TYPE capscale_capacity gauge\n");
    for (c, _) in collections {
        let _ = writeln!(out, "capscale_capacity{{collection=\"{}\"}} {}", escape_label(&c.id), c.capacity);
    }

    out.push_str("# HELP capscale_capacity_ceiling Maximum capacity for the current partition count.\n");
    out.push_str("# TYPE capscale_capacity_ceiling gauge\n");
    for (c, _) in collections {
        let _ = writeln!(
            out,
            "capscale_capacity_ceiling{{collection=\"{}\"}} {}",
            escape_label(&c.id),
            c.ceiling()
        );
    }

    out.push_str("# HELP capscale_partitions Physical partition count.\n");
    out.push_str("# TYPE capscale_partitions gauge\n");
    for (c, _) in collections {
        let _ = writeln!(out, "capscale_partitions{{collection=\"{}\"}} {}", escape_label(&c.id), c.partitions);
    }

    out.push_str("# HELP capscale_recent_requests Requests observed in the recent window.\n");
    out.push_str("# TYPE capscale_recent_requests gauge\n");
    for (c, s) in collections {
        let _ = writeln!(
            out,
            "capscale_recent_requests{{collection=\"{}\"}} {}",
            escape_label(&c.id), s.total_recent_requests
        );
    }

    out.push_str("# HELP capscale_recent_throttled Throttled requests in the recent window.\n");
    out.push_str("# TYPE capscale_recent_throttled gauge\n");
    for (c, s) in collections {
        let _ = writeln!(
            out,
            "capscale_recent_throttled{{collection=\"{}\"}} {}",
            escape_label(&c.id), s.total_recent_throttled
        );
    }

    out.push_str("# HELP capscale_recent_success_rate Unthrottled fraction (0.0-1.0) in the recent window.\n");
    out.push_str("# TYPE capscale_recent_success_rate gauge\n");
    for (c, s) in collections {
        if let Some(rate) = s.recent_success_rate() {
            let _ = writeln!(
                out,
                "capscale_recent_success_rate{{collection=\"{}\"}} {rate:.4}",
                escape_label(&c.id)
            );
        }
    }

    out
}

/// Escape a label value per the text exposition format.
fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, capacity: u64, partitions: u32) -> CollectionRecord {
        CollectionRecord {
            id: id.to_string(),
            capacity,
            partitions,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn renders_labels_and_values() {
        let rows = vec![(
            record("commands", 1200, 2),
            ThrottleSummary::new((1000, 100), (0, 0)),
        )];
        let body = render_prometheus(&rows);

        assert!(body.contains("capscale_capacity{collection=\"commands\"} 1200"));
        assert!(body.contains("capscale_capacity_ceiling{collection=\"commands\"} 20000"));
        assert!(body.contains("capscale_partitions{collection=\"commands\"} 2"));
        assert!(body.contains("capscale_recent_throttled{collection=\"commands\"} 100"));
        assert!(body.contains("capscale_recent_success_rate{collection=\"commands\"} 0.9000"));
    }

    #[test]
    fn skips_rate_without_traffic() {
        let rows = vec![(record("idle", 400, 1), ThrottleSummary::default())];
        let body = render_prometheus(&rows);

        assert!(body.contains("capscale_recent_requests{collection=\"idle\"} 0"));
        assert!(!body.contains("capscale_recent_success_rate{"));
    }

    #[test]
    fn label_values_are_escaped() {
        let rows = vec![(record("a\"b\\c\nd", 100, 1), ThrottleSummary::default())];
        let body = render_prometheus(&rows);

        assert!(body.contains(r#"capscale_capacity{collection="a\"b\\c\nd"} 100"#));
        // Every sample stays on one line.
        assert!(body.lines().filter(|l| !l.starts_with('#')).all(|l| l.starts_with("capscale_")));
    }

    #[test]
    fn empty_input_has_headers_only() {
        let body = render_prometheus(&[]);
        assert!(body.contains("# TYPE capscale_capacity gauge"));
        assert!(!body.contains("collection="));
    }
}
