//! CSV export of the final lead list, same columns as the operator table.

use chrono::{DateTime, Utc};

use crate::lead::Lead;

pub const CSV_HEADER: [&str; 9] = [
    "Practice",
    "Phone",
    "Email",
    "Location",
    "Posted",
    "Website",
    "Decision Maker",
    "Size",
    "Source",
];

/// Quote a field when it contains a delimiter, a quote or a line break.
pub fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `postedAt` as `YYYY-MM-DD HH:MM` (UTC), falling back to the source's text.
pub fn posted_display(lead: &Lead) -> String {
    match (&lead.posted_at, &lead.posted_at_text) {
        (Some(t), _) => t.format("%Y-%m-%d %H:%M").to_string(),
        (None, Some(text)) => text.clone(),
        (None, None) => String::new(),
    }
}

pub fn leads_to_csv(leads: &[Lead]) -> String {
    let mut lines = Vec::with_capacity(leads.len() + 1);
    lines.push(CSV_HEADER.join(","));

    for l in leads {
        let row = [
            l.practice_name.clone(),
            l.phone.clone().unwrap_or_default(),
            l.email.clone().unwrap_or_default(),
            l.location.display(),
            posted_display(l),
            l.website.clone().unwrap_or_default(),
            l.decision_maker_name.clone().unwrap_or_default(),
            l.practice_size.clone().unwrap_or_default(),
            l.source_url.clone().unwrap_or_default(),
        ];
        lines.push(row.iter().map(|f| csv_escape(f)).collect::<Vec<_>>().join(","));
    }

    let mut out = lines.join("\r\n");
    out.push_str("\r\n");
    out
}

/// `dental-receptionist-leads-YYYYMMDD-HHMM.csv`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("dental-receptionist-leads-{}.csv", now.format("%Y%m%d-%H%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::Location;
    use chrono::TimeZone;

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("Smith, Jones & Co"), "\"Smith, Jones & Co\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn rows_follow_header() {
        let mut l = Lead::new(
            "Bright Smiles Dental",
            Location::new(Some("Austin"), Some("TX"), Some("78701")),
        );
        l.phone = Some("(512) 555-0100".into());
        l.posted_at = Some(Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 0).unwrap());

        let mut undated = Lead::new("Oak Dental", Location::default());
        undated.posted_at_text = Some("2 days ago".into());

        let csv = leads_to_csv(&[l, undated]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "Practice,Phone,Email,Location,Posted,Website,Decision Maker,Size,Source"
        );
        assert_eq!(
            lines[1],
            "Bright Smiles Dental,(512) 555-0100,,\"Austin, TX, 78701\",2026-10-18 09:05,,,,"
        );
        assert_eq!(lines[2], "Oak Dental,,,,2 days ago,,,,");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn filename_has_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 14, 7, 0).unwrap();
        assert_eq!(
            export_filename(now),
            "dental-receptionist-leads-20261019-1407.csv"
        );
    }
}
