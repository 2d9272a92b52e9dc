//! Document rendering for exports and reports.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, Utc};

use parkhub_core::types::money::round_cents;
use parkhub_entity::reservation::ReservationDetail;

/// Column header of the parking history export.
pub const CSV_HEADER: &str = "Lot Name,Spot Number,Booked On,Parked On,Left On,Cost";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format an instant in the local offset.
pub fn format_local(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string()
}

fn format_optional(instant: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    instant.map_or_else(|| "N/A".to_string(), |t| format_local(t, offset))
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// One CSV row per reservation, in the given order, after the header.
pub fn history_csv(rows: &[ReservationDetail], offset: FixedOffset) -> String {
    let mut out = String::with_capacity(64 * (rows.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for row in rows {
        let r = &row.reservation;
        let cost = r.parking_cost.map_or_else(|| "0.00".to_string(), |c| format!("{c:.2}"));
        let line = [
            csv_field(&row.lot_name).into_owned(),
            row.spot_number.to_string(),
            format_local(r.booking_timestamp, offset),
            format_optional(r.parking_timestamp, offset),
            format_optional(r.leaving_timestamp, offset),
            cost,
        ]
        .join(",");
        out.push_str(&line);
        out.push('\n');
    }

    out
}

/// Aggregates of one user's settled reservations over the report window.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    /// Settled reservations in the window.
    pub spots_booked: usize,
    /// Sum of their costs.
    pub total_spent: f64,
    /// Lot with the most reservations; the first one seen wins ties.
    pub most_used_lot: Option<String>,
}

impl MonthlySummary {
    /// Summarize settled reservations.
    pub fn from_reservations(rows: &[ReservationDetail]) -> Self {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for row in rows {
            match counts.iter_mut().find(|(name, _)| *name == row.lot_name) {
                Some((_, n)) => *n += 1,
                None => counts.push((row.lot_name.as_str(), 1)),
            }
        }

        let mut most_used: Option<(&str, usize)> = None;
        for (name, n) in counts {
            if most_used.is_none_or(|(_, best)| n > best) {
                most_used = Some((name, n));
            }
        }

        let total: f64 = rows
            .iter()
            .filter_map(|r| r.reservation.parking_cost)
            .sum();

        Self {
            spots_booked: rows.len(),
            total_spent: round_cents(total),
            most_used_lot: most_used.map(|(name, _)| name.to_string()),
        }
    }
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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

/// The monthly activity report as a standalone HTML document.
pub fn monthly_report_html(username: &str, summary: &MonthlySummary, window_days: i64) -> String {
    let username = escape_html(username);
    let lot = escape_html(summary.most_used_lot.as_deref().unwrap_or("N/A"));
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Monthly Parking Report for {username}</title>
<style>
body {{ font-family: sans-serif; }}
h1 {{ color: #333; }}
ul {{ list-style-type: none; padding: 0; }}
li {{ background: #f4f4f4; margin: 5px 0; padding: 10px; border-radius: 5px; }}
</style>
</head>
<body>
<h1>Monthly Parking Report for {username}</h1>
<p>Hi {username},</p>
<p>Here is your activity summary for the last {window_days} days:</p>
<ul>
<li><b>Total Spots Booked:</b> {booked}</li>
<li><b>Total Amount Spent:</b> &#8377;{spent:.2}</li>
<li><b>Most Used Parking Lot:</b> {lot}</li>
</ul>
<p>Thank you for using ParkHub!</p>
</body>
</html>
"#,
        booked = summary.spots_booked,
        spent = summary.total_spent,
    )
}
