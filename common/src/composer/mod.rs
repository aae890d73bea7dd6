//! QCシート作成モジュール
//!
//! 様式（xlsx）の書式・罫線・既存の内容をそのまま残し、
//! アクティブシートに STYLE NO・サイズ・計測値・差分式を書き込む。

mod drawing;
pub mod package;
pub mod sheet;

pub use drawing::{LogoFormat, LogoImage};
pub use sheet::{CellContent, CellWrite};

use crate::error::{Error, Result};
use crate::layout::{TemplateLayout, MAX_ROW};
use crate::types::{MeasurementEntry, MeasurementValue};
use crate::cell::CellRef;
use package::Package;

/// 様式パッケージ操作のエラー
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("{0} がありません")]
    MissingPart(String),
    #[error("{0}")]
    Invalid(String),
}

impl From<PackageError> for Error {
    fn from(e: PackageError) -> Self {
        Error::malformed("QCシート様式", e)
    }
}

/// 書き込むセルの一覧（STYLE NO, サイズ, 各行の部位名・スペック値・差分式）
///
/// 計測値がシートの最終行を超える場合は InvalidQuery
pub fn plan_writes(
    entries: &[MeasurementEntry],
    style: &str,
    size: &str,
    layout: &TemplateLayout,
) -> Result<Vec<CellWrite>> {
    let mut writes = Vec::with_capacity(2 + entries.len() * 3);
    writes.push(CellWrite::new(
        layout.style_cell,
        CellContent::Text(style.to_string()),
    ));
    writes.push(CellWrite::new(
        layout.size_cell,
        CellContent::Text(size.to_string()),
    ));

    for (i, entry) in entries.iter().enumerate() {
        let row = layout.entry_row(i).ok_or_else(|| {
            Error::InvalidQuery(format!(
                "{}件目の計測値がシートの最終行（{}行）を超えます（anchor_row = {}）",
                i + 1,
                MAX_ROW,
                layout.anchor_row
            ))
        })?;
        let r = row - 1;
        writes.push(CellWrite::new(
            CellRef::new(r, layout.label_col),
            CellContent::Text(entry.label.clone()),
        ));
        let spec = match &entry.value {
            MeasurementValue::Number(n) => CellContent::Number(*n),
            MeasurementValue::Text(s) => CellContent::Text(s.clone()),
        };
        writes.push(CellWrite::new(CellRef::new(r, layout.spec_col), spec));
        writes.push(CellWrite::new(
            CellRef::new(r, layout.delta_col),
            CellContent::Formula(layout.delta_formula(row)),
        ));
    }
    Ok(writes)
}

/// 様式に書き込んだ新しいブックを返す。様式のバイト列は変更しない
pub fn compose(
    template: &[u8],
    entries: &[MeasurementEntry],
    style: &str,
    size: &str,
    logo: Option<&LogoImage>,
    layout: &TemplateLayout,
) -> Result<Vec<u8>> {
    if template.is_empty() {
        return Err(Error::TemplateMissing);
    }
    if layout.anchor_row == 0 {
        return Err(Error::InvalidQuery("anchor_row は1以上です".to_string()));
    }

    let mut package = Package::from_bytes(template)?;
    let target = package.active_sheet()?;

    let writes = plan_writes(entries, style, size, layout)?;
    let patched = sheet::patch_cells(package.require_part(&target.path)?, &writes)?;
    package.set_part(target.path.clone(), patched);
    package.force_full_calc()?;

    if let Some(logo) = logo {
        drawing::embed_logo(&mut package, &target.path, logo, layout.image_anchor)?;
    }

    Ok(package.to_bytes()?)
}
