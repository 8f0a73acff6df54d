//! XLSX report rendering.

use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, Table, TableColumn, TableStyle, Workbook,
    XlsxError,
};
use tracing::debug;

use crate::models::{ExtractionRecord, ExtractionSummary, ReportConfig};

/// MIME type of the generated report.
pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Column headers, in report order.
pub const HEADERS: [&str; 3] = ["CNPJ", "Nome da Empresa", "Regime Tributário"];

/// Most characters a worksheet cell accepts.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Most data rows that fit below the band and header rows.
pub const MAX_DATA_ROWS: usize = 1_048_576 - 2;

/// Widest column a worksheet allows, in characters.
pub const MAX_COLUMN_WIDTH: usize = 255;

const BAND_ROW: u32 = 0;
const HEADER_ROW: u32 = 1;
const LAST_COL: u16 = HEADERS.len() as u16 - 1;

/// Text of the merged summary band above the table.
pub fn summary_band(summary: &ExtractionSummary) -> String {
    format!(
        "Total lidos: {} | Duplicados removidos: {} | Total final: {}",
        summary.total_read, summary.duplicates_removed, summary.total_final
    )
}

/// Width of each column: longest header or value, in characters, plus
/// padding, capped at [`MAX_COLUMN_WIDTH`].
pub fn column_widths(records: &[ExtractionRecord], padding: usize) -> [usize; 3] {
    let mut widths = HEADERS.map(|h| h.chars().count());

    for record in records {
        for (width, cell) in widths.iter_mut().zip(record.cells()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    widths.map(|w| w.saturating_add(padding).min(MAX_COLUMN_WIDTH))
}

/// Renders deduplicated records into a single-sheet workbook.
///
/// Layout: row 1 holds the merged summary band, row 2 the styled column
/// headers, and one data row per record follows. The header and data rows
/// are registered as a named table when there is at least one record.
pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Download file name for the rendered report.
    pub fn file_name(&self) -> &str {
        &self.config.file_name
    }

    /// Render the workbook and return its bytes.
    pub fn render(
        &self,
        records: &[ExtractionRecord],
        summary: &ExtractionSummary,
    ) -> Result<Vec<u8>, XlsxError> {
        let records = &records[..records.len().min(MAX_DATA_ROWS)];

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.config.sheet_name)?;

        let band_format = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_background_color(Color::RGB(0xD9E1F2))
            .set_border(FormatBorder::Thin);

        let header_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x1F4E78))
            .set_align(FormatAlign::Center)
            .set_border(FormatBorder::Thin);

        worksheet.merge_range(
            BAND_ROW,
            0,
            BAND_ROW,
            LAST_COL,
            &summary_band(summary),
            &band_format,
        )?;
        worksheet.set_row_height(BAND_ROW, 22.0)?;

        if !records.is_empty() {
            let columns: Vec<TableColumn> = HEADERS
                .iter()
                .map(|header| TableColumn::new().set_header(*header))
                .collect();
            let table = Table::new()
                .set_name(&self.config.table_name)
                .set_style(TableStyle::Medium2)
                .set_columns(&columns);
            let last_row = HEADER_ROW + records.len() as u32;

            worksheet.add_table(HEADER_ROW, 0, last_row, LAST_COL, &table)?;
        }

        // Must follow add_table, which writes unformatted header cells.
        for (col, header) in HEADERS.iter().enumerate() {
            worksheet.write_string_with_format(HEADER_ROW, col as u16, *header, &header_format)?;
        }

        for (i, record) in records.iter().enumerate() {
            let row = HEADER_ROW + 1 + i as u32;
            for (col, cell) in record.cells().into_iter().enumerate() {
                worksheet.write_string(row, col as u16, cell)?;
            }
        }

        for (col, width) in column_widths(records, self.config.column_padding)
            .into_iter()
            .enumerate()
        {
            worksheet.set_column_width(col as u16, width as f64)?;
        }

        worksheet.set_freeze_panes(HEADER_ROW + 1, 0)?;

        let bytes = workbook.save_to_buffer()?;
        debug!("Rendered report with {} rows ({} bytes)", records.len(), bytes.len());

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfe::rules::Regime;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_summary_band() {
        let summary = ExtractionSummary::new(2, 1);
        assert_eq!(
            summary_band(&summary),
            "Total lidos: 2 | Duplicados removidos: 1 | Total final: 1"
        );
    }

    #[test]
    fn test_column_widths_use_longest_value() {
        let records = vec![
            ExtractionRecord::new("11.222.333/0001-81", "ACME LTDA", Regime::SimplesNacional),
            ExtractionRecord::new(
                "529.982.247-25",
                "JOSÉ DA SILVA COMÉRCIO DE ALIMENTOS",
                Regime::SimplesNacionalExcessoSublimite,
            ),
        ];

        let widths = column_widths(&records, 2);

        assert_eq!(widths, [20, 37, 54]);
    }

    #[test]
    fn test_column_widths_without_records() {
        assert_eq!(column_widths(&[], 2), [6, 17, 19]);
    }

    #[test]
    fn test_column_widths_are_capped() {
        let long_name = "A".repeat(400);
        let records = vec![ExtractionRecord::new("1", long_name, Regime::Mei)];

        assert_eq!(column_widths(&records, 2)[1], MAX_COLUMN_WIDTH);
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut xml = String::new();
        std::io::Read::read_to_string(&mut part, &mut xml).unwrap();
        xml
    }

    #[test]
    fn test_render_merges_band_and_styles_header() {
        let generator = ReportGenerator::new(ReportConfig::default());
        let records = vec![ExtractionRecord::new(
            "11.222.333/0001-81",
            "ACME LTDA",
            Regime::SimplesNacional,
        )];

        let bytes = generator
            .render(&records, &ExtractionSummary::new(1, 1))
            .unwrap();

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<mergeCell ref="A1:C1"/>"#), "{sheet}");
        assert!(sheet.contains(r#"<pane ySplit="2" topLeftCell="A3""#), "{sheet}");

        let styles = read_part(&bytes, "xl/styles.xml");
        assert!(styles.contains(r#"<color rgb="FFFFFFFF"/>"#), "{styles}");
        assert!(styles.contains(r#"<fgColor rgb="FF1F4E78"/>"#), "{styles}");
        assert!(styles.contains("<b/>"), "{styles}");

        let table = read_part(&bytes, "xl/tables/table1.xml");
        assert!(table.contains(r#"ref="A2:C3""#), "{table}");
        assert!(table.contains(r#"name="RegimeTributario""#), "{table}");
    }

    #[test]
    fn test_render_produces_xlsx_container() {
        let generator = ReportGenerator::new(ReportConfig::default());
        let records = vec![ExtractionRecord::new(
            "11.222.333/0001-81",
            "ACME LTDA",
            Regime::SimplesNacional,
        )];

        let bytes = generator
            .render(&records, &ExtractionSummary::new(1, 1))
            .unwrap();

        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_render_without_records() {
        let generator = ReportGenerator::new(ReportConfig::default());

        let bytes = generator.render(&[], &ExtractionSummary::default()).unwrap();

        assert!(!bytes.is_empty());
    }
}
