use rust_xlsxwriter::{Format, Workbook};

use super::{Cell, ExportError, Sheet};

// Worksheet names are capped at 31 characters and may not contain []:*?/\
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Export".to_string()
    } else {
        cleaned
    }
}

pub(super) fn render(sheet: &Sheet) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(&sheet.title))?;

    for (col, header) in sheet.headers.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, *header, &bold)?;
        worksheet.set_column_width(col, 22)?;
    }

    for (i, row) in sheet.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(r, col, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(r, col, *n)?;
                }
                Cell::Empty => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}
