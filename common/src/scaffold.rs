//! QCシート様式の新規作成
//!
//! 様式がまだ登録されていないときのために、レイアウト設定どおりの
//! 空の様式を rust_xlsxwriter で作る。

use crate::error::{Error, Result};
use crate::layout::TemplateLayout;
use rust_xlsxwriter::*;

const SHEET_NAME: &str = "QC";
const TITLE: &str = "QC INSPECTION SHEET";

fn scaffold_err(context: &str, e: XlsxError) -> Error {
    Error::ScaffoldFailed(format!("{}: {}", context, e))
}

/// 空の様式（タイトル、STYLE NO / SIZE 欄、計測表の見出しと罫線、検品者欄）
pub fn scaffold_template(layout: &TemplateLayout) -> Result<Vec<u8>> {
    if layout.anchor_row < 2 {
        return Err(Error::InvalidQuery(
            "anchor_row は2以上にしてください（見出し行が必要です）".to_string(),
        ));
    }

    let mut workbook = Workbook::new();

    let title_format = Format::new().set_bold().set_font_size(16.0);

    let caption_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_align(FormatAlign::Right)
        .set_align(FormatAlign::VerticalCenter);

    let input_format = Format::new()
        .set_font_size(11.0)
        .set_align(FormatAlign::Center)
        .set_border_bottom(FormatBorder::Thin);

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin);

    let cell_format = Format::new()
        .set_font_size(10.0)
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0x999999));

    let number_format = cell_format.clone().set_num_format("0.0");

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(SHEET_NAME)
        .map_err(|e| scaffold_err("シート名設定エラー", e))?;

    // 列幅
    worksheet
        .set_column_width(layout.label_col as u16, 28.0)
        .map_err(|e| scaffold_err("列幅設定エラー", e))?;
    for col in [layout.spec_col, layout.actual_col, layout.delta_col] {
        worksheet
            .set_column_width(col as u16, 12.0)
            .map_err(|e| scaffold_err("列幅設定エラー", e))?;
    }

    worksheet
        .write_string_with_format(0, 0, TITLE, &title_format)
        .map_err(|e| scaffold_err("タイトル書き込みエラー", e))?;

    // STYLE NO / SIZE 欄（見出しは記入セルの左隣）
    for (cell, caption) in [(layout.style_cell, "STYLE NO"), (layout.size_cell, "SIZE")] {
        if cell.col > 0 {
            worksheet
                .write_string_with_format(cell.row, (cell.col - 1) as u16, caption, &caption_format)
                .map_err(|e| scaffold_err("見出し書き込みエラー", e))?;
        }
        worksheet
            .write_blank(cell.row, cell.col as u16, &input_format)
            .map_err(|e| scaffold_err("記入欄書き込みエラー", e))?;
    }

    // 計測表の見出し（開始行の1行上）
    let header_row = layout.anchor_row - 2;
    let columns = [
        (layout.label_col, "POM"),
        (layout.spec_col, "SPEC"),
        (layout.actual_col, "ACTUAL"),
        (layout.delta_col, "DIFF"),
    ];
    for (col, title) in columns {
        worksheet
            .write_string_with_format(header_row, col as u16, title, &header_format)
            .map_err(|e| scaffold_err("表見出し書き込みエラー", e))?;
    }

    // 罫線付きの空行
    let last_row = layout.table_end_row.max(layout.anchor_row);
    for row in layout.anchor_row..=last_row {
        let r = row - 1;
        for (col, _) in columns {
            let format = if col == layout.spec_col || col == layout.delta_col {
                &number_format
            } else {
                &cell_format
            };
            worksheet
                .write_blank(r, col as u16, format)
                .map_err(|e| scaffold_err("表書き込みエラー", e))?;
        }
    }

    // 検品者欄
    let footer = last_row + 1;
    worksheet
        .write_string_with_format(footer, layout.label_col as u16, "INSPECTOR", &caption_format)
        .map_err(|e| scaffold_err("検品者欄書き込みエラー", e))?;
    worksheet
        .write_string_with_format(footer + 1, layout.label_col as u16, "DATE", &caption_format)
        .map_err(|e| scaffold_err("検品者欄書き込みエラー", e))?;

    workbook
        .save_to_buffer()
        .map_err(|e| scaffold_err("様式保存エラー", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::compose;
    use crate::types::MeasurementEntry;
    use calamine::{Data, Reader, Xlsx};
    use std::io::Cursor;

    #[test]
    fn test_scaffold_default_layout() {
        let bytes = scaffold_template(&TemplateLayout::default()).unwrap();
        let mut book: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
        assert_eq!(book.sheet_names(), vec!["QC".to_string()]);

        let range = book.worksheet_range("QC").unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String(TITLE.to_string())));
        assert_eq!(
            range.get_value((5, 0)),
            Some(&Data::String("STYLE NO".to_string()))
        );
        assert_eq!(range.get_value((5, 5)), Some(&Data::String("SIZE".to_string())));
        assert_eq!(range.get_value((7, 0)), Some(&Data::String("POM".to_string())));
        assert_eq!(range.get_value((7, 3)), Some(&Data::String("DIFF".to_string())));
        assert_eq!(
            range.get_value((38, 0)),
            Some(&Data::String("INSPECTOR".to_string()))
        );
    }

    #[test]
    fn test_scaffold_then_compose() {
        let layout = TemplateLayout::default();
        let template = scaffold_template(&layout).unwrap();
        let entries = vec![MeasurementEntry::new("Chest", 102.0)];
        let out = compose(&template, &entries, "JXFTO11", "M", None, &layout).unwrap();

        let mut book: Xlsx<_> = Xlsx::new(Cursor::new(out)).unwrap();
        let range = book.worksheet_range("QC").unwrap();
        assert_eq!(
            range.get_value((5, 1)),
            Some(&Data::String("JXFTO11".to_string()))
        );
        assert_eq!(range.get_value((8, 1)), Some(&Data::Float(102.0)));
    }

    #[test]
    fn test_scaffold_rejects_anchor_on_first_row() {
        let layout = TemplateLayout {
            anchor_row: 1,
            ..Default::default()
        };
        assert!(matches!(
            scaffold_template(&layout),
            Err(Error::InvalidQuery(_))
        ));
    }
}
