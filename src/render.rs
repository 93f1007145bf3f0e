//! Feedback report workbook renderer
//!
//! Each report group becomes one single-sheet workbook:
//!
//! ```text
//! | Feedback Report - {topic}                                   | (merged A:D)
//! | Date: {session date}                                        | (merged A:D)
//! | Sr No | Best part ... | Rate the overall ... | Improved ... |
//! | 1     | ...           | 4.5                  | ...          |
//! |       | Average Rating| =IFERROR(AVERAGEIFS) |              |
//!
//! | {footer}                                                    | (merged A:D)
//! ```

use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Formula, Workbook, XlsxError};

use crate::models::{ReportGroup, COL_BEST_PART, COL_IMPROVEMENT, COL_RATING, COL_SERIAL};
use crate::normalize::is_no_comment;

pub const NO_COMMENT_TEXT: &str = "No comments from the Learner";
pub const SHEET_NAME: &str = "Feedback Report";
pub const DEFAULT_FOOTER: &str = "Developed by EMERITUS — Feedback Automation Tool";

const FIRST_DATA_ROW: u32 = 3;
const ACCENT: u32 = 0x00B050;
const ATTENTION: u32 = 0xFF0000;
const FONT: &str = "Arial";
const COLUMN_WIDTHS: [f64; 4] = [18.86, 42.86, 42.57, 47.86];

#[derive(Debug, Clone, PartialEq)]
pub enum ImprovementCell {
    Comment(String),
    NoComment,
}

impl ImprovementCell {
    pub fn text(&self) -> &str {
        match self {
            ImprovementCell::Comment(text) => text,
            ImprovementCell::NoComment => NO_COMMENT_TEXT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub serial: usize,
    pub best_part: String,
    pub rating: Option<f64>,
    pub improvement: ImprovementCell,
}

/// Cell-level plan of one report. Row indices are zero-based.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub subtitle: String,
    pub rows: Vec<ReportRow>,
    pub summary_row: u32,
    pub footer_row: u32,
    pub average_formula: String,
    pub average: Option<f64>,
}

impl ReportLayout {
    /// Non-zero ratings in row order, for the run-wide running average.
    pub fn rated_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.rows
            .iter()
            .filter_map(|row| row.rating)
            .filter(|rating| *rating != 0.0)
    }
}

/// Mean of the strictly positive ratings, or `None` when there are none.
pub fn average_of_positive(ratings: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = ratings
        .into_iter()
        .filter(|rating| *rating > 0.0)
        .fold((0.0, 0usize), |(sum, count), rating| (sum + rating, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Report workbook renderer
#[derive(Clone, Debug)]
pub struct ReportRenderer {
    /// Attribution text in the merged footer row
    pub footer: String,
    /// Sheet zoom percentage
    pub zoom: u16,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            footer: DEFAULT_FOOTER.into(),
            zoom: 90,
        }
    }
}

struct ReportFormats {
    title: Format,
    subtitle: Format,
    header: Format,
    body: Format,
    no_comment: Format,
    summary_label: Format,
    summary_value: Format,
    summary_fill: Format,
    footer: Format,
}

impl ReportRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    /// Lays out one group. Pure; nothing is written.
    pub fn layout(&self, group: &ReportGroup<'_>) -> ReportLayout {
        let rows: Vec<ReportRow> = group
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| ReportRow {
                serial: index + 1,
                best_part: record.best_part.clone(),
                rating: record.rating,
                improvement: if is_no_comment(&record.improvement) {
                    ImprovementCell::NoComment
                } else {
                    ImprovementCell::Comment(record.improvement.clone())
                },
            })
            .collect();

        let summary_row = FIRST_DATA_ROW + rows.len() as u32;
        let first = FIRST_DATA_ROW + 1;
        let last = summary_row.max(first);
        let average_formula =
            format!("=IFERROR(AVERAGEIFS(C{first}:C{last},C{first}:C{last},\">0\"),\"\")");
        let average = average_of_positive(rows.iter().filter_map(|row| row.rating));

        ReportLayout {
            title: format!("Feedback Report - {}", group.topic_label()),
            subtitle: format!("Date: {}", group.key.session_date),
            rows,
            summary_row,
            footer_row: summary_row + 2,
            average_formula,
            average,
        }
    }

    pub fn to_workbook(&self, layout: &ReportLayout) -> Result<Workbook, XlsxError> {
        let formats = Self::create_formats();
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        sheet.merge_range(0, 0, 0, 3, &layout.title, &formats.title)?;
        sheet.set_row_height(0, 37.5)?;
        sheet.merge_range(1, 0, 1, 3, &layout.subtitle, &formats.subtitle)?;
        sheet.set_row_height(1, 18.75)?;

        let headers = [COL_SERIAL, COL_BEST_PART, COL_RATING, COL_IMPROVEMENT];
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(2, col as u16, *header, &formats.header)?;
        }
        sheet.set_row_height(2, 30.95)?;

        for (offset, row) in layout.rows.iter().enumerate() {
            let r = FIRST_DATA_ROW + offset as u32;
            sheet.write_number_with_format(r, 0, row.serial as f64, &formats.body)?;
            sheet.write_string_with_format(r, 1, &row.best_part, &formats.body)?;
            match row.rating {
                Some(rating) => sheet.write_number_with_format(r, 2, rating, &formats.body)?,
                None => sheet.write_blank(r, 2, &formats.body)?,
            };
            let improvement_format = match row.improvement {
                ImprovementCell::Comment(_) => &formats.body,
                ImprovementCell::NoComment => &formats.no_comment,
            };
            sheet.write_string_with_format(r, 3, row.improvement.text(), improvement_format)?;
            sheet.set_row_height(r, 30.0)?;
        }

        let summary = layout.summary_row;
        let cached = layout.average.map(|avg| avg.to_string()).unwrap_or_default();
        sheet.write_string_with_format(summary, 1, "Average Rating", &formats.summary_label)?;
        sheet.write_formula_with_format(
            summary,
            2,
            Formula::new(&layout.average_formula).set_result(cached),
            &formats.summary_value,
        )?;
        sheet.write_blank(summary, 3, &formats.summary_fill)?;
        sheet.set_row_height(summary, 25.0)?;

        sheet.merge_range(layout.footer_row, 0, layout.footer_row, 3, &self.footer, &formats.footer)?;
        sheet.set_row_height(layout.footer_row, 25.0)?;

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            sheet.set_column_width(col as u16, *width)?;
        }
        sheet.set_freeze_panes(FIRST_DATA_ROW, 1)?;
        sheet.set_zoom(self.zoom);
        sheet.set_print_fit_to_pages(1, 0);

        Ok(workbook)
    }

    /// Renders one group straight to `.xlsx` bytes.
    pub fn render_to_bytes(&self, group: &ReportGroup<'_>) -> Result<(ReportLayout, Vec<u8>), XlsxError> {
        let layout = self.layout(group);
        let mut workbook = self.to_workbook(&layout)?;
        let bytes = workbook.save_to_buffer()?;
        Ok((layout, bytes))
    }

    fn create_formats() -> ReportFormats {
        let centered = Format::new()
            .set_font_name(FONT)
            .set_font_size(12)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter)
            .set_text_wrap();

        let title = centered
            .clone()
            .set_font_size(14)
            .set_bold()
            .set_background_color(Color::RGB(ACCENT));

        let subtitle = centered.clone().set_bold();

        let header = centered
            .clone()
            .set_bold()
            .set_background_color(Color::RGB(ACCENT))
            .set_border(FormatBorder::Thin);

        let body = centered.clone().set_border(FormatBorder::Thin);

        let no_comment = body
            .clone()
            .set_bold()
            .set_font_color(Color::RGB(ATTENTION));

        let summary_fill = centered.clone().set_background_color(Color::RGB(ACCENT));
        let summary_label = summary_fill.clone().set_bold();
        let summary_value = summary_label.clone().set_num_format("0.00");

        let footer = centered.set_bold().set_italic().set_font_color(Color::RGB(0x000000));

        ReportFormats {
            title,
            subtitle,
            header,
            body,
            no_comment,
            summary_label,
            summary_value,
            summary_fill,
            footer,
        }
    }
}
