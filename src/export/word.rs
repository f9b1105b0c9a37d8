use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

use super::{ExportError, Sheet};

fn cell(text: String, bold: bool) -> TableCell {
    let run = Run::new().add_text(text);
    let run = if bold { run.bold() } else { run };
    TableCell::new().add_paragraph(Paragraph::new().add_run(run))
}

pub(super) fn render(sheet: &Sheet) -> Result<Vec<u8>, ExportError> {
    let mut rows = Vec::with_capacity(sheet.rows.len() + 1);
    rows.push(TableRow::new(sheet.headers.iter().map(|h| cell(h.to_string(), true)).collect()));
    for row in &sheet.rows {
        rows.push(TableRow::new(row.iter().map(|c| cell(c.as_text(), false)).collect()));
    }

    let title = Paragraph::new().add_run(Run::new().add_text(sheet.title.clone()).bold().size(32));
    let generated = Paragraph::new().add_run(
        Run::new().add_text(format!("Generated {}", chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"))).size(18),
    );

    let mut buf = Cursor::new(Vec::new());
    Docx::new()
        .add_paragraph(title)
        .add_paragraph(generated)
        .add_table(Table::new(rows))
        .build()
        .pack(&mut buf)
        .map_err(|e| ExportError::Word(e.to_string()))?;
    Ok(buf.into_inner())
}
