use std::io::Cursor;

use docx_rs::{
    AlignmentType, BreakType, Docx, Paragraph, Pic, Run, RunFonts, Table, TableCell,
    TableLayoutType, TableRow, VAlignType,
};

use super::{Attachment, ExportRow};
use crate::error::AppError;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub const IMAGE_PLACEHOLDER: &str = "[Gambar tidak dapat ditampilkan]";

const FONT: &str = "Times New Roman";
/// Half-points: 12pt body default, 10pt inside the table.
const BODY_SIZE: usize = 24;
const TABLE_SIZE: usize = 20;
/// 2.5 inches.
const IMAGE_WIDTH_EMU: u32 = 2_286_000;
/// Column grid in twips; Word still auto-fits to content.
const GRID: [usize; 4] = [700, 1900, 1500, 5500];

const HEADERS: [&str; 4] = ["NO.", "HARI/TGL", "JAM", "KEGIATAN PER HARI"];

/// Render the rows into a complete `.docx` file.
pub fn render(rows: &[ExportRow]) -> Result<Vec<u8>, AppError> {
    let mut table_rows = Vec::with_capacity(rows.len() + 1);
    table_rows.push(header_row());
    table_rows.extend(rows.iter().map(data_row));

    let table = Table::new(table_rows)
        .set_grid(GRID.to_vec())
        .layout(TableLayoutType::Autofit);

    let mut buf = Vec::new();
    Docx::new()
        .default_fonts(fonts())
        .default_size(BODY_SIZE)
        .add_table(table)
        .build()
        .pack(Cursor::new(&mut buf))
        .map_err(|e| AppError::Document(e.to_string()))?;
    Ok(buf)
}

fn fonts() -> RunFonts {
    RunFonts::new()
        .ascii(FONT)
        .hi_ansi(FONT)
        .east_asia(FONT)
        .cs(FONT)
}

fn run() -> Run {
    Run::new().fonts(fonts()).size(TABLE_SIZE)
}

/// A run whose `\n`s become line breaks.
fn text_run(text: &str) -> Run {
    text.split('\n')
        .enumerate()
        .fold(run(), |acc, (idx, line)| {
            let acc = if idx > 0 {
                acc.add_break(BreakType::TextWrapping)
            } else {
                acc
            };
            if line.is_empty() {
                acc
            } else {
                acc.add_text(line)
            }
        })
}

fn bold_run(text: &str) -> Run {
    text_run(text).bold()
}

fn centered_cell(run: Run) -> TableCell {
    TableCell::new()
        .add_paragraph(Paragraph::new().add_run(run).align(AlignmentType::Center))
        .vertical_align(VAlignType::Center)
}

fn header_row() -> TableRow {
    TableRow::new(
        HEADERS
            .iter()
            .map(|title| centered_cell(bold_run(title)))
            .collect(),
    )
}

fn data_row(row: &ExportRow) -> TableRow {
    TableRow::new(vec![
        centered_cell(text_run(&row.number.to_string())),
        centered_cell(text_run(&row.tanggal)),
        centered_cell(text_run(&row.jam)),
        TableCell::new()
            .add_paragraph(kegiatan_paragraph(row))
            .vertical_align(VAlignType::Center),
    ])
}

fn kegiatan_paragraph(row: &ExportRow) -> Paragraph {
    let mut paragraph = Paragraph::new()
        .add_run(bold_run("Judul Kegiatan:\n"))
        .add_run(text_run(&format!("• {}\n\n", row.judul)))
        .add_run(bold_run("Rincian Kegiatan:\n"))
        .add_run(text_run(&format!("• {}\n\n", row.rincian)));

    if let Some(dokumen) = &row.dokumen {
        paragraph = paragraph.add_run(bold_run("Dokumen Pendukung:\n\n"));
        paragraph = match dokumen {
            Attachment::Image(img) => paragraph.add_run(
                run().add_image(
                    Pic::new(&img.png).size(IMAGE_WIDTH_EMU, img.scaled_height(IMAGE_WIDTH_EMU)),
                ),
            ),
            Attachment::Unavailable => paragraph.add_run(text_run(IMAGE_PLACEHOLDER)),
        };
    }
    paragraph
}
