// CSV export of lineups in the platform's upload layout.
//
// The header is the template's slot labels in order (a label repeats when
// the template repeats it); each row holds the occupants' names, with empty
// cells for open slots. Totals columns are optional.

use std::io::Write;

use thiserror::Error;

use crate::lineup::Lineup;
use crate::template::RosterTemplate;

pub const SPENT_COLUMN: &str = "Spent";
pub const PROJECTED_COLUMN: &str = "Projected";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lineup {index} has {found} slots but the template has {expected}")]
    ShapeMismatch {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[error("exported CSV is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Header row for `template`.
pub fn header(template: &RosterTemplate, with_totals: bool) -> Vec<String> {
    let mut row: Vec<String> = template.labels().into_iter().map(String::from).collect();
    if with_totals {
        row.push(SPENT_COLUMN.to_string());
        row.push(PROJECTED_COLUMN.to_string());
    }
    row
}

/// One data row for `lineup`.
pub fn record(lineup: &Lineup, with_totals: bool) -> Vec<String> {
    let mut row = lineup.export_row();
    if with_totals {
        row.push(lineup.spent().to_string());
        row.push(format!("{:.2}", lineup.projected()));
    }
    row
}

/// Write a header followed by one row per lineup.
///
/// Every lineup must have been built from a template with the same number of
/// slots, otherwise the rows would not line up with the header.
pub fn write_lineups<W: Write>(
    writer: W,
    template: &RosterTemplate,
    lineups: &[Lineup],
    with_totals: bool,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header(template, with_totals))?;

    for (index, lineup) in lineups.iter().enumerate() {
        if lineup.roster_size() != template.roster_size() {
            return Err(ExportError::ShapeMismatch {
                index,
                found: lineup.roster_size(),
                expected: template.roster_size(),
            });
        }
        wtr.write_record(record(lineup, with_totals))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Render lineups to an in-memory CSV string.
pub fn to_csv_string(
    template: &RosterTemplate,
    lineups: &[Lineup],
    with_totals: bool,
) -> Result<String, ExportError> {
    let mut buf = Vec::new();
    write_lineups(&mut buf, template, lineups, with_totals)?;
    Ok(String::from_utf8(buf)?)
}
