//! Merge one day's scraped values into its month sheet.
//!
//! One call = one (sheet, date label) pair. The sheet is fetched whole,
//! merged in memory, written back in a single bulk update, then the Total
//! row, currency format, SUM formula and column widths are fixed up with
//! separate calls. Re-running with the same label and values rewrites the
//! same cells; no rows or columns are duplicated.

use log::{info, warn};

use revsheet_core::{cell_ref, col_to_letter, Project, ScrapeResult};

use crate::api::{SheetMeta, SpreadsheetApi};
use crate::error::ReconError;
use crate::grid::{CellValue, ColumnSlot, SheetGrid, Upsert, NAME_HEADER, TOTAL_LABEL};

/// First data row, 1-based (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone)]
pub struct ReconOptions {
    /// Capacity of newly created sheets.
    pub new_sheet_rows: u32,
    pub new_sheet_columns: u32,
    /// A1 window read from the sheet (no sheet prefix).
    pub read_range: String,
    /// Number-format pattern for the day column.
    pub currency_pattern: String,
    /// Log the intended merge instead of touching the spreadsheet.
    pub dry_run: bool,
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            new_sheet_rows: 2000,
            new_sheet_columns: 200,
            read_range: "A1:ZZ1000".to_string(),
            currency_pattern: "\"Rp\"#,##0".to_string(),
            dry_run: false,
        }
    }
}

/// Result of the pure, in-memory part of a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub column: ColumnSlot,
    pub inserted: usize,
    pub updated: usize,
    /// Project names that cannot be row keys (header or Total collisions).
    pub skipped: Vec<String>,
}

/// Rows covered by the SUM formula, 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SumSpan {
    pub start_row: usize,
    pub end_row: usize,
}

impl SumSpan {
    /// Row holding the formula: the Total row right below the span.
    pub fn formula_row(&self) -> usize {
        self.end_row + 1
    }

    pub fn formula(&self, column: usize) -> String {
        let letter = col_to_letter(column);
        format!("=SUM({letter}{}:{letter}{})", self.start_row, self.end_row)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconReport {
    pub sheet_title: String,
    pub sheet_id: Option<i64>,
    pub created_sheet: bool,
    pub column: usize,
    pub column_letter: String,
    pub created_column: bool,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<String>,
    /// 1-based row of the Total row after the merge.
    pub total_row: Option<usize>,
    pub created_total_row: bool,
    pub sum_formula: Option<String>,
    pub dry_run: bool,
}

/// Steps 3-5: resolve the day column, pad ragged rows, upsert every project.
pub fn merge(grid: &mut SheetGrid, date_label: &str, entries: &[(&Project, ScrapeResult)]) -> MergeOutcome {
    let column = grid.ensure_column(date_label);
    grid.pad_rows();

    let mut outcome = MergeOutcome { column, inserted: 0, updated: 0, skipped: Vec::new() };
    for (project, result) in entries {
        let name = project.name.as_str();
        if name == TOTAL_LABEL || name == NAME_HEADER {
            outcome.skipped.push(name.to_string());
            continue;
        }
        match grid.upsert(name, column.index, CellValue::from(*result)) {
            Upsert::Inserted(_) => outcome.inserted += 1,
            Upsert::Updated(_) => outcome.updated += 1,
        }
    }
    outcome
}

/// Data rows above the Total row at `total_idx` (0-based). `None` when
/// there are no data rows.
pub fn sum_span(total_idx: usize) -> Option<SumSpan> {
    // 0-based total index == 1-based row number of the row above it
    let end_row = total_idx;
    if end_row < FIRST_DATA_ROW {
        return None;
    }
    Some(SumSpan { start_row: FIRST_DATA_ROW, end_row })
}

pub struct Reconciler {
    options: ReconOptions,
}

impl Reconciler {
    pub fn new(options: ReconOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconOptions {
        &self.options
    }

    /// Find the sheet named `title`, creating it when missing.
    pub fn ensure_sheet(
        &self,
        api: &mut dyn SpreadsheetApi,
        title: &str,
    ) -> Result<(SheetMeta, bool), ReconError> {
        if let Some(meta) = api.sheets()?.into_iter().find(|s| s.title == title) {
            return Ok((meta, false));
        }
        info!("sheet {title:?} not found, creating it");
        let meta = api.add_sheet(title, self.options.new_sheet_rows, self.options.new_sheet_columns)?;
        info!("sheet {title:?} created (id {})", meta.sheet_id);
        Ok((meta, true))
    }

    /// Merge `entries` into column `date_label` of sheet `sheet_name`.
    pub fn reconcile(
        &self,
        api: &mut dyn SpreadsheetApi,
        sheet_name: &str,
        date_label: &str,
        entries: &[(&Project, ScrapeResult)],
    ) -> Result<ReconReport, ReconError> {
        if self.options.dry_run {
            return Ok(self.preview(sheet_name, date_label, entries));
        }

        let (meta, created_sheet) = self.ensure_sheet(api, sheet_name)?;
        let values = api.read_values(sheet_name, &self.options.read_range)?;
        let mut grid = SheetGrid::from_rows(values);

        let outcome = merge(&mut grid, date_label, entries);
        for name in &outcome.skipped {
            warn!("project name {name:?} collides with a reserved row label; not written");
        }

        let header_len = grid.header_len();
        if outcome.column.created && (meta.column_count as usize) < header_len {
            info!(
                "growing {sheet_name:?} from {} to {header_len} columns",
                meta.column_count
            );
            api.set_column_count(meta.sheet_id, header_len as u32)?;
        }

        api.write_grid(meta.sheet_id, grid.rows())?;
        info!(
            "{sheet_name:?} column {date_label:?}: {} updated, {} inserted",
            outcome.updated, outcome.inserted
        );

        let mut report = ReconReport {
            sheet_title: sheet_name.to_string(),
            sheet_id: Some(meta.sheet_id),
            created_sheet,
            column: outcome.column.index,
            column_letter: col_to_letter(outcome.column.index),
            created_column: outcome.column.created,
            inserted: outcome.inserted,
            updated: outcome.updated,
            skipped: outcome.skipped,
            ..ReconReport::default()
        };

        let total_idx = match grid.total_row() {
            Some(idx) => idx,
            None => {
                let idx = grid.ensure_total_row();
                api.write_cell(sheet_name, &cell_ref(idx, 0), &CellValue::text(TOTAL_LABEL))?;
                info!("{sheet_name:?}: Total row created at row {}", idx + 1);
                report.created_total_row = true;
                idx
            }
        };
        report.total_row = Some(total_idx + 1);

        let Some(span) = sum_span(total_idx) else {
            info!("{sheet_name:?}: no data rows, skipping format and formula");
            return Ok(report);
        };

        let col = outcome.column.index;
        api.format_currency(
            meta.sheet_id,
            (span.start_row - 1)..span.end_row,
            col,
            &self.options.currency_pattern,
        )?;

        let formula = span.formula(col);
        let target = format!("{}{}", col_to_letter(col), span.formula_row());
        api.write_cell(sheet_name, &target, &CellValue::Formula(formula.clone()))?;
        grid.set(total_idx, col, CellValue::Formula(formula.clone()));
        info!("{sheet_name:?}: {formula} written to {target}");

        api.auto_resize_columns(meta.sheet_id, 0..header_len)?;
        report.sum_formula = Some(formula);
        Ok(report)
    }

    /// Describe what [`reconcile`](Self::reconcile) would do, without any API call.
    pub fn preview(
        &self,
        sheet_name: &str,
        date_label: &str,
        entries: &[(&Project, ScrapeResult)],
    ) -> ReconReport {
        info!("dry run: nothing is sent to the spreadsheet");
        info!("dry run: sheet {sheet_name:?}, column {date_label:?}, {} projects", entries.len());
        for (project, result) in entries.iter().take(3) {
            info!("dry run:   {} = {}", project.name, result);
        }
        ReconReport {
            sheet_title: sheet_name.to_string(),
            column_letter: String::new(),
            dry_run: true,
            ..ReconReport::default()
        }
    }
}
