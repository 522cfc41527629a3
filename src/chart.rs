//! SVG line chart of interest over time.

use crate::trends::TimeSeriesTable;
use quick_xml::escape::escape;
use std::fmt::Write as _;

pub const CHART_TITLE: &str = "Google Trends: Interest Over Time";

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 200.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;
const X_TICKS: usize = 6;

const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// `iot_chart_{keywords joined by _}_{timestamp}.svg`
pub fn chart_filename(keywords: &[String], timestamp: &str) -> String {
    let safe: Vec<String> = keywords.iter().map(|k| k.replace(' ', "_")).collect();
    format!("iot_chart_{}_{}.svg", safe.join("_"), timestamp)
}

/// One line per column; gaps in a column break its line.
pub fn render_interest_chart(table: &TimeSeriesTable) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;

    let times: Vec<i64> = table.rows().map(|(t, _)| t.timestamp()).collect();
    let (t_min, t_max) = match (times.first(), times.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => (0, 0),
    };
    let t_span = (t_max - t_min).max(1) as f64;
    let y_max = table
        .rows()
        .flat_map(|(_, values)| values.iter().flatten().copied())
        .max()
        .unwrap_or(0)
        .max(100) as f64;

    let x_of = |t: i64| {
        if t_max == t_min {
            MARGIN_LEFT + plot_w / 2.0
        } else {
            MARGIN_LEFT + (t - t_min) as f64 / t_span * plot_w
        }
    };
    let y_of = |v: u32| MARGIN_TOP + plot_h - f64::from(v) / y_max * plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    let _ = writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#);
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="30" text-anchor="middle" font-size="18">{}</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        CHART_TITLE
    );

    // y grid and labels
    for step in 0..=5 {
        let value = y_max * f64::from(step) / 5.0;
        let y = MARGIN_TOP + plot_h - plot_h * f64::from(step) / 5.0;
        let _ = writeln!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#dddddd"/>"##,
            MARGIN_LEFT + plot_w
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{value:.0}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0
        );
    }

    // x grid and labels
    if !times.is_empty() {
        let rows: Vec<_> = table.rows().map(|(t, _)| *t).collect();
        let ticks = X_TICKS.min(rows.len());
        for i in 0..ticks {
            let idx = if ticks == 1 { 0 } else { i * (rows.len() - 1) / (ticks - 1) };
            let time = rows[idx];
            let x = x_of(time.timestamp());
            let _ = writeln!(
                svg,
                r##"<line x1="{x:.1}" y1="{MARGIN_TOP}" x2="{x:.1}" y2="{:.1}" stroke="#dddddd"/>"##,
                MARGIN_TOP + plot_h
            );
            let _ = writeln!(
                svg,
                r#"<text x="{x:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
                MARGIN_TOP + plot_h + 20.0,
                time.format("%Y-%m-%d")
            );
        }
    }

    let _ = writeln!(
        svg,
        r#"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w}" height="{plot_h}" fill="none" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="14">Date</text>"#,
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 20.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="20" y="{:.1}" text-anchor="middle" font-size="14" transform="rotate(-90 20 {:.1})">Relative Interest</text>"#,
        MARGIN_TOP + plot_h / 2.0,
        MARGIN_TOP + plot_h / 2.0
    );

    for (col, keyword) in table.columns().iter().enumerate() {
        let color = PALETTE[col % PALETTE.len()];

        let mut path = String::new();
        let mut pen_down = false;
        let mut single_points = Vec::new();
        let mut segment_len = 0;
        for (time, values) in table.rows() {
            match values.get(col).copied().flatten() {
                Some(v) => {
                    let (x, y) = (x_of(time.timestamp()), y_of(v));
                    let _ = write!(path, "{}{x:.1},{y:.1} ", if pen_down { "L" } else { "M" });
                    if !pen_down {
                        segment_len = 0;
                    }
                    pen_down = true;
                    segment_len += 1;
                    if segment_len == 1 {
                        single_points.push((x, y));
                    } else if segment_len == 2 {
                        single_points.pop();
                    }
                }
                None => pen_down = false,
            }
        }

        if !path.is_empty() {
            let _ = writeln!(
                svg,
                r#"<path d="{}" fill="none" stroke="{color}" stroke-width="2"/>"#,
                path.trim_end()
            );
        }
        for (x, y) in single_points {
            let _ = writeln!(svg, r#"<circle cx="{x:.1}" cy="{y:.1}" r="3" fill="{color}"/>"#);
        }

        let legend_y = MARGIN_TOP + 20.0 + col as f64 * 20.0;
        let legend_x = MARGIN_LEFT + plot_w + 20.0;
        let _ = writeln!(
            svg,
            r#"<line x1="{legend_x}" y1="{legend_y}" x2="{:.1}" y2="{legend_y}" stroke="{color}" stroke-width="3"/>"#,
            legend_x + 24.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}">{}</text>"#,
            legend_x + 32.0,
            legend_y + 4.0,
            escape(keyword.as_str())
        );
    }

    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).single().expect("date")
    }

    #[test]
    fn test_chart_filename() {
        let keywords = vec!["boho dress".to_string(), "linen pants".to_string()];
        assert_eq!(
            chart_filename(&keywords, "20250101_120000"),
            "iot_chart_boho_dress_linen_pants_20250101_120000.svg"
        );
    }

    #[test]
    fn test_chart_has_line_per_keyword() {
        let mut table = TimeSeriesTable::from_points("a & b", vec![(day(1), 10), (day(2), 100)]);
        let c = TimeSeriesTable::from_points("c", vec![(day(1), 0), (day(2), 50), (day(3), 75)]);
        table.outer_join(c);

        let svg = render_interest_chart(&table);
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<path ").count(), 2);
        assert!(svg.contains("a &amp; b"));
        assert!(svg.contains(CHART_TITLE));
        assert!(svg.contains("2025-01-03"));
    }

    #[test]
    fn test_isolated_point_drawn_as_marker() {
        let mut table =
            TimeSeriesTable::from_points("dense", vec![(day(1), 1), (day(2), 2), (day(3), 3)]);
        table.outer_join(TimeSeriesTable::from_points("sparse", vec![(day(2), 40)]));

        let svg = render_interest_chart(&table);
        assert_eq!(svg.matches("<circle ").count(), 1);
    }

    #[test]
    fn test_empty_table_renders() {
        let svg = render_interest_chart(&TimeSeriesTable::new());
        assert!(svg.contains("</svg>"));
        assert!(!svg.contains("<path "));
    }
}
