//! CSV export for measurements
//!
//! Writes one row per measurement followed by an optional per-condition totals
//! section, for spreadsheets and estimating tools.

use crate::measurement::Measurement;
use crate::space::NormalizedPoint;
use crate::summary::{summarize, ConditionTotal};
use std::io::Write;

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type CsvExportResult<T> = Result<T, CsvExportError>;

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Append a per-condition totals section after the rows
    pub include_totals: bool,

    /// Export only measurements on these PDF pages (None = all pages)
    pub page_filter: Option<Vec<u32>>,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
            include_totals: true,
            page_filter: None,
        }
    }
}

const MEASUREMENT_HEADERS: [&str; 14] = [
    "ID",
    "Project",
    "Sheet",
    "Page",
    "Type",
    "Condition",
    "Value",
    "Unit",
    "Formatted",
    "Perimeter",
    "Uncalibrated",
    "Points",
    "Label X",
    "Label Y",
];

const TOTAL_HEADERS: [&str; 7] =
    ["Condition", "Type", "Unit", "Count", "Total", "Perimeter", "Uncalibrated"];

/// Export measurements to CSV format.
///
/// Rows keep the order given. When `include_totals` is set, a second header row
/// starting with `Condition` introduces one line per (condition, unit) total; the
/// two sections have different widths.
pub fn export_measurements_csv<W: Write>(
    writer: W,
    measurements: &[Measurement],
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .flexible(true)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record(MEASUREMENT_HEADERS)?;
    }

    let filtered: Vec<&Measurement> = measurements
        .iter()
        .filter(|m| {
            config
                .page_filter
                .as_ref()
                .map_or(true, |pages| pages.contains(&m.pdf_page))
        })
        .collect();

    for m in &filtered {
        // Label position only fails on empty point lists, which never reach the store.
        let (label_x, label_y) = m
            .label_position()
            .map(|p| (format!("{:.6}", p.x), format!("{:.6}", p.y)))
            .unwrap_or_default();

        csv_writer.write_record(&[
            m.id.to_string(),
            m.project_id.to_string(),
            m.sheet_id.to_string(),
            m.pdf_page.to_string(),
            m.measurement_type.as_str().to_string(),
            m.condition_id.to_string(),
            format!("{:.4}", m.calculated_value),
            m.unit.clone(),
            m.formatted_label(),
            m.perimeter_value.map(|p| format!("{p:.4}")).unwrap_or_default(),
            m.uncalibrated.to_string(),
            format_points(&m.points_normalized),
            label_x,
            label_y,
        ])?;
    }

    if config.include_totals {
        let totals = summarize(filtered.iter().copied());
        write_totals(&mut csv_writer, &totals, config.include_headers)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export only the per-condition totals.
pub fn export_totals_csv<W: Write>(
    writer: W,
    measurements: &[Measurement],
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    let filtered = measurements.iter().filter(|m| {
        config
            .page_filter
            .as_ref()
            .map_or(true, |pages| pages.contains(&m.pdf_page))
    });

    write_totals(&mut csv_writer, &summarize(filtered), config.include_headers)?;
    csv_writer.flush()?;
    Ok(())
}

fn write_totals<W: Write>(
    csv_writer: &mut csv::Writer<W>,
    totals: &[ConditionTotal],
    include_headers: bool,
) -> CsvExportResult<()> {
    if include_headers {
        csv_writer.write_record(TOTAL_HEADERS)?;
    }

    for total in totals {
        csv_writer.write_record(&[
            total.condition_id.to_string(),
            total.measurement_type.as_str().to_string(),
            total.unit.clone(),
            total.count.to_string(),
            format!("{:.4}", total.total),
            total.perimeter_total.map(|p| format!("{p:.4}")).unwrap_or_default(),
            total.uncalibrated.to_string(),
        ])?;
    }
    Ok(())
}

/// Normalized points as `(x,y);(x,y)`
fn format_points(points: &[NormalizedPoint]) -> String {
    points
        .iter()
        .map(|p| format!("({:.6},{:.6})", p.x, p.y))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{MeasurementId, MeasurementType};

    fn measurement(
        page: u32,
        condition: &str,
        kind: MeasurementType,
        value: f64,
        unit: &str,
    ) -> Measurement {
        Measurement {
            id: MeasurementId::new_v4(),
            project_id: "tower".into(),
            sheet_id: "A-101".into(),
            pdf_page: page,
            measurement_type: kind,
            points_normalized: vec![NormalizedPoint::new(0.1, 0.1), NormalizedPoint::new(0.1, 0.3)],
            calculated_value: value,
            unit: unit.to_string(),
            condition_id: condition.into(),
            perimeter_value: None,
            uncalibrated: false,
        }
    }

    fn export(measurements: &[Measurement], config: &CsvExportConfig) -> String {
        let mut output = Vec::new();
        export_measurements_csv(&mut output, measurements, config).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn rows_then_totals_section() {
        let measurements = vec![
            measurement(1, "walls", MeasurementType::Linear, 10.0, "ft"),
            measurement(1, "walls", MeasurementType::Linear, 2.5, "ft"),
        ];

        let csv_content = export(&measurements, &CsvExportConfig::default());
        let lines: Vec<&str> = csv_content.lines().collect();

        assert!(lines[0].starts_with("ID,Project,Sheet,Page,Type,Condition,Value,Unit"));
        assert!(lines[1].contains(",tower,A-101,1,Linear,walls,10.0000,ft,10.00 ft,,false,"));
        assert!(lines[1].contains("(0.100000,0.100000);(0.100000,0.300000)"));
        assert_eq!(lines[3], "Condition,Type,Unit,Count,Total,Perimeter,Uncalibrated");
        assert_eq!(lines[4], "walls,Linear,ft,2,12.5000,,0");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn page_filter_limits_rows() {
        let measurements = vec![
            measurement(1, "walls", MeasurementType::Linear, 10.0, "ft"),
            measurement(2, "walls", MeasurementType::Linear, 4.0, "ft"),
        ];
        let config = CsvExportConfig {
            page_filter: Some(vec![2]),
            include_totals: false,
            ..Default::default()
        };

        let csv_content = export(&measurements, &config);
        assert_eq!(csv_content.lines().count(), 2); // Header + 1 measurement
        assert!(csv_content.contains("4.0000"));
    }

    #[test]
    fn totals_only_export() {
        let measurements = vec![
            measurement(1, "outlets", MeasurementType::Count, 1.0, "EA"),
            measurement(2, "outlets", MeasurementType::Count, 1.0, "EA"),
            measurement(1, "walls", MeasurementType::Linear, 3.0, "ft"),
        ];
        let mut output = Vec::new();
        export_totals_csv(&mut output, &measurements, &CsvExportConfig::default()).unwrap();

        let csv_content = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = csv_content.lines().collect();
        assert_eq!(lines[1], "outlets,Count,EA,2,2.0000,,0");
        assert_eq!(lines[2], "walls,Linear,ft,1,3.0000,,0");
    }

    #[test]
    fn custom_delimiter_without_headers() {
        let measurements = vec![measurement(1, "walls", MeasurementType::Linear, 1.0, "ft")];
        let config = CsvExportConfig {
            include_headers: false,
            delimiter: b';',
            include_totals: false,
            page_filter: None,
        };

        let csv_content = export(&measurements, &config);
        assert_eq!(csv_content.lines().count(), 1);
        assert!(csv_content.contains(";tower;A-101;1;Linear;walls;1.0000;ft;"));
    }
}
