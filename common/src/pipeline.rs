//! 生成パイプライン
//!
//! スペック表 → スタイル解決 → 計測値抽出 → 様式へ書き込み を1回の呼び出しで行う。
//! 入力はすべてバイト列で受け取り、毎回読み込み直す（キャッシュしない）。

use crate::composer::{self, LogoImage};
use crate::error::{Error, Result};
use crate::extractor::{self, ExtractOptions, Extraction};
use crate::layout::{SpecLayout, TemplateLayout};
use crate::resolver::{self, ResolveOptions, ResolveWarning, Resolved};
use crate::types::{Language, MeasurementEntry, ScanStats, SheetRef, StyleQuery};
use crate::workbook::SpecWorkbook;

/// 生成オプション一式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    pub resolve: ResolveOptions,
    pub spec_layout: SpecLayout,
    pub extract: ExtractOptions,
    pub template_layout: TemplateLayout,
}

/// 生成結果
#[derive(Debug, Clone)]
pub struct GeneratedSheet {
    pub bytes: Vec<u8>,
    /// `QC_{style}_{size}.xlsx`
    pub file_name: String,
    pub sheet: SheetRef,
    pub entries: Vec<MeasurementEntry>,
    pub stats: ScanStats,
    pub warnings: Vec<ResolveWarning>,
}

/// スペック表からスタイル番号のシートを探す
pub fn resolve_style(spec: &[u8], style: &str, options: &GenerateOptions) -> Result<Resolved> {
    let workbook = SpecWorkbook::from_bytes(spec)?;
    resolver::resolve(&workbook, style, &options.resolve, &options.spec_layout)
}

/// 指定シートから計測値を抽出する
pub fn extract_measurements(
    spec: &[u8],
    sheet: &SheetRef,
    size: &str,
    language: Language,
    options: &GenerateOptions,
) -> Result<Extraction> {
    let workbook = SpecWorkbook::from_bytes(spec)?;
    extract_from(&workbook, sheet, size, language, options)
}

fn extract_from(
    workbook: &SpecWorkbook,
    sheet: &SheetRef,
    size: &str,
    language: Language,
    options: &GenerateOptions,
) -> Result<Extraction> {
    let spec_sheet = workbook.sheet(sheet).ok_or_else(|| Error::SheetNotFound {
        expected: sheet.name.clone(),
    })?;
    extractor::extract(spec_sheet, size, language, &options.spec_layout, &options.extract)
}

/// 様式に書き込む。画像は PNG / JPEG のみ
pub fn compose_output(
    template: &[u8],
    entries: &[MeasurementEntry],
    style: &str,
    size: &str,
    image: Option<&[u8]>,
    layout: &TemplateLayout,
) -> Result<Vec<u8>> {
    let logo = image.map(|bytes| LogoImage::from_bytes(bytes.to_vec())).transpose()?;
    composer::compose(template, entries, style, size, logo.as_ref(), layout)
}

fn validate(query: &StyleQuery) -> Result<()> {
    if query.style.trim().is_empty() {
        return Err(Error::InvalidQuery("STYLE NO が空です".to_string()));
    }
    if query.size.trim().is_empty() {
        return Err(Error::InvalidQuery("サイズが空です".to_string()));
    }
    Ok(())
}

/// 一括生成
pub fn generate(
    spec: &[u8],
    template: &[u8],
    image: Option<&[u8]>,
    query: &StyleQuery,
    options: &GenerateOptions,
) -> Result<GeneratedSheet> {
    validate(query)?;
    let workbook = SpecWorkbook::from_bytes(spec)?;
    let resolved = resolver::resolve(&workbook, &query.style, &options.resolve, &options.spec_layout)?;
    generate_with_sheet(&workbook, resolved, template, image, query, options)
}

/// シートが決まっている場合の生成（曖昧一致を利用者に選ばせた後など）
pub fn generate_with_sheet(
    workbook: &SpecWorkbook,
    resolved: Resolved,
    template: &[u8],
    image: Option<&[u8]>,
    query: &StyleQuery,
    options: &GenerateOptions,
) -> Result<GeneratedSheet> {
    validate(query)?;
    if template.is_empty() {
        return Err(Error::TemplateMissing);
    }

    let extraction = extract_from(workbook, &resolved.sheet, &query.size, query.language, options)?;
    let style = query.style.trim();
    let size = query.size.trim();
    let bytes = compose_output(
        template,
        &extraction.entries,
        style,
        size,
        image,
        &options.template_layout,
    )?;

    Ok(GeneratedSheet {
        bytes,
        file_name: query.output_file_name(),
        sheet: resolved.sheet,
        entries: extraction.entries,
        stats: extraction.stats,
        warnings: resolved.warning.into_iter().collect(),
    })
}
