//! Deduplication and CSV serialization of extracted contacts.

use std::collections::HashSet;
use std::io;

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::AppError;
use crate::models::{ExportRow, ExtractedContact};

pub const HEADER: [&str; 4] = ["EMAIL", "FIRSTNAME", "LASTNAME", "SMS"];

/// One row per distinct lower-cased email, in first-seen order.
///
/// Records without an email are skipped.
pub fn dedupe(records: &[ExtractedContact]) -> Vec<ExportRow> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let email = record.email.trim().to_lowercase();
            if email.is_empty() || !seen.insert(email.clone()) {
                return None;
            }
            Some(ExportRow {
                email,
                first_name: record.first_name.clone(),
                last_name: record.last_name.clone(),
                sms: record.phone.clone(),
            })
        })
        .collect()
}

/// Writes the header and every row. The header is written even with no rows.
pub fn write_csv<W: io::Write>(rows: &[ExportRow], writer: W) -> Result<(), AppError> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(HEADER)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(rows: &[ExportRow]) -> Result<String, AppError> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| AppError::Generic(format!("CSV is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn contact(email: &str, first: &str, phone: &str) -> ExtractedContact {
        ExtractedContact {
            email: email.into(),
            first_name: first.into(),
            last_name: "Doe".into(),
            phone: phone.into(),
            source_profile_url: "https://x.com/agent/a".into(),
            source_contact_url: "https://x.com/agent/a".into(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let rows = dedupe(&[
            contact("Jane@Example.com", "Jane", "+19045550001"),
            contact("bob@example.com", "Bob", ""),
            contact("jane@example.com", "Janet", "+19045550002"),
            contact("", "Nobody", ""),
            contact("BOB@EXAMPLE.COM ", "Robert", ""),
        ]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].email, "jane@example.com");
        assert_eq!(rows[0].first_name, "Jane");
        assert_eq!(rows[0].sms, "+19045550001");
        assert_eq!(rows[1].email, "bob@example.com");
        assert_eq!(rows[1].first_name, "Bob");
    }

    #[test]
    fn empty_export_still_has_header() {
        assert_eq!(to_csv_string(&[]).unwrap(), "EMAIL,FIRSTNAME,LASTNAME,SMS\n");
    }

    #[test]
    fn plain_rows() {
        let rows = dedupe(&[ExtractedContact {
            last_name: "Public".into(),
            ..contact("Jane@Example.com", "Jane Q.", "+19045551234")
        }]);
        assert_eq!(
            to_csv_string(&rows).unwrap(),
            "EMAIL,FIRSTNAME,LASTNAME,SMS\njane@example.com,Jane Q.,Public,+19045551234\n"
        );
    }

    #[test]
    fn quotes_only_when_needed_and_parses_back() {
        let tricky = "He said, \"hi\"\ntoday";
        let rows = vec![ExportRow {
            email: "a@b.co".into(),
            first_name: tricky.into(),
            last_name: String::new(),
            sms: String::new(),
        }];
        let out = to_csv_string(&rows).unwrap();
        assert!(out.contains("\"He said, \"\"hi\"\"\ntoday\""));

        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "a@b.co");
        assert_eq!(&record[1], tricky);
        assert_eq!(&record[2], "");
    }
}
