//! Formatting utilities for durations and route summaries.

use crate::router::{RouteKind, RouteTable};
use owo_colors::OwoColorize;
use std::time::Duration;

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use nova_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Print every registered route, one per line, to stderr.
pub fn print_route_summary(table: &RouteTable) {
    let routes = table.routes();
    if routes.is_empty() {
        eprintln!("  {}", "no routes".dimmed());
        return;
    }

    let width = routes.iter().map(|r| r.pattern.len()).max().unwrap_or(0);
    for route in routes {
        let kind = match route.kind {
            RouteKind::Render => "render".cyan().to_string(),
            RouteKind::Rest => "rest".magenta().to_string(),
        };
        eprintln!(
            "  {:<width$}  {}  {}",
            route.pattern.bold(),
            kind,
            route.handler.dimmed(),
            width = width
        );
    }
}
