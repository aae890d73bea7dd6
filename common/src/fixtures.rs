//! テスト用のスペック表・QCシート様式・画像をメモリ上で生成する

use image::{ImageFormat, Rgb, RgbImage};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;

/// フィクスチャのセル
#[derive(Debug, Clone, Copy)]
pub enum Cell {
    T(&'static str),
    N(f64),
    E,
}

struct FixtureSheet {
    name: &'static str,
    marker: &'static str,
    header: Vec<&'static str>,
    rows: Vec<Vec<Cell>>,
}

/// スペック表ビルダー（A1: マーカー, 2行目: 見出し, 3行目以降: データ）
#[derive(Default)]
pub struct SpecBook {
    sheets: Vec<FixtureSheet>,
}

impl SpecBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(
        mut self,
        name: &'static str,
        marker: &'static str,
        header: &[&'static str],
        rows: &[&[Cell]],
    ) -> Self {
        self.sheets.push(FixtureSheet {
            name,
            marker,
            header: header.to_vec(),
            rows: rows.iter().map(|r| r.to_vec()).collect(),
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet.name).unwrap();
            if !sheet.marker.is_empty() {
                worksheet.write_string(0, 0, sheet.marker).unwrap();
            }
            for (col, title) in sheet.header.iter().enumerate() {
                if !title.is_empty() {
                    worksheet.write_string(1, col as u16, *title).unwrap();
                }
            }
            for (i, row) in sheet.rows.iter().enumerate() {
                let r = 2 + i as u32;
                for (col, cell) in row.iter().enumerate() {
                    match cell {
                        Cell::T(s) => {
                            worksheet.write_string(r, col as u16, *s).unwrap();
                        }
                        Cell::N(n) => {
                            worksheet.write_number(r, col as u16, *n).unwrap();
                        }
                        Cell::E => {}
                    }
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }
}

/// 旧来のQCシート様式を模したもの（D9:D37 に差分式が事前入力済み、B9 に書式あり）
pub fn template_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let number = Format::new().set_num_format("0.0");
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("QC").unwrap();
    worksheet.write_string_with_format(0, 0, "QC SHEET", &bold).unwrap();
    worksheet.write_string(5, 0, "STYLE NO").unwrap();
    worksheet.write_string(5, 5, "SIZE").unwrap();
    worksheet.write_string(7, 0, "POM").unwrap();
    worksheet.write_string(7, 1, "SPEC").unwrap();
    worksheet.write_string(7, 2, "ACTUAL").unwrap();
    worksheet.write_string(7, 3, "DIFF").unwrap();
    worksheet.write_string(8, 0, "OLD LABEL").unwrap();
    worksheet.write_number_with_format(8, 1, 0.0, &number).unwrap();
    for r in 9..=37u32 {
        let formula = format!(r#"=IF(C{0}="","",IFERROR(C{0}-B{0},""))"#, r);
        worksheet.write_formula(r - 1, 3, formula.as_str()).unwrap();
    }
    worksheet.write_string(39, 0, "INSPECTOR").unwrap();
    workbook.save_to_buffer().unwrap()
}

/// 単色の PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}
