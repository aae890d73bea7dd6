//! サブコマンドの処理本体
//!
//! main.rs からは引数の受け渡しだけを行い、保管庫と設定はここで受け取る。

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::error::{QcSheetError, Result};
use crate::selector;
use crate::store::{Category, FileStore};
use qc_sheet_common::{
    discover_styles, generate_with_sheet, resolve, scaffold_template, Error, Extraction,
    Fallback, GenerateOptions, GeneratedSheet, LogoImage, MeasurementEntry, Resolved, ScanStats,
    SheetRef, SizeMatch, SpecWorkbook, StyleMarker, StyleQuery,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 引数と設定ファイルから生成オプションを組み立てる（引数が優先）
pub fn generate_options(args: &TargetArgs, config: &Config) -> GenerateOptions {
    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.match_mode = mode;
    }
    if let Some(len) = args.suffix_len {
        config.suffix_len = len;
    }
    if let Some(column) = args.label_column {
        config.label_column = column;
    }

    let mut options = config.generate_options();
    if args.fallback_first_sheet {
        options.resolve.fallback = Fallback::FirstSheet;
    }
    if args.ignore_size_case {
        options.extract.size_match = SizeMatch::IgnoreCase;
    }
    options
}

pub fn style_query(args: &TargetArgs, config: &Config) -> StyleQuery {
    StyleQuery::new(
        args.style.trim(),
        args.size.trim(),
        args.lang.unwrap_or(config.language),
    )
}

/// ファイルを保管庫に登録し、保存名を返す
pub fn upload(
    store: &mut dyn FileStore,
    category: Category,
    files: &[PathBuf],
) -> Result<Vec<String>> {
    if category == Category::Template && files.len() > 1 {
        return Err(QcSheetError::UnsupportedFile(
            "QCシート様式は1ファイルのみ登録できます".to_string(),
        ));
    }

    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        if !file.is_file() {
            return Err(QcSheetError::FileNotFound(file.display().to_string()));
        }
        let bytes = std::fs::read(file)?;
        validate_upload(category, &bytes)?;

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let saved = store.write(category, &name, &bytes)?;
        if saved != name {
            println!("  ⚠ 同名のファイルがあるため {} として保存", saved);
        }
        println!("✔ {} を登録: {}", category, saved);
        stored.push(saved);
    }
    Ok(stored)
}

/// 壊れたファイルは登録前に弾く
fn validate_upload(category: Category, bytes: &[u8]) -> Result<()> {
    match category {
        Category::Spec | Category::Template => {
            SpecWorkbook::from_bytes(bytes)?;
        }
        Category::Image => {
            LogoImage::from_bytes(bytes.to_vec())?;
        }
    }
    Ok(())
}

pub fn list(store: &dyn FileStore, category: Option<Category>) -> Result<()> {
    let categories = match category {
        Some(c) => vec![c],
        None => Category::ALL.to_vec(),
    };

    for category in categories {
        let names = store.list(category)?;
        println!("{} ({}件)", category, names.len());
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

pub fn delete(store: &mut dyn FileStore, category: Category, name: &str) -> Result<()> {
    store.delete(category, name)?;
    println!("✔ {} を削除: {}", category, name);
    Ok(())
}

/// スペック表ごとの STYLE NO 一覧（--spec 省略時は登録済みすべて）
pub fn catalog(
    store: &dyn FileStore,
    spec: Option<&str>,
    config: &Config,
) -> Result<Vec<(String, Vec<StyleMarker>)>> {
    let files = match spec {
        Some(value) => vec![selector::load_named(store, Category::Spec, value)?],
        None => {
            let names = store.list(Category::Spec)?;
            if names.is_empty() {
                return Err(QcSheetError::StoreEmpty(Category::Spec.to_string()));
            }
            names
                .into_iter()
                .map(|name| {
                    let bytes = store.read(Category::Spec, &name)?;
                    Ok((name, bytes))
                })
                .collect::<Result<Vec<_>>>()?
        }
    };

    let layout = config.generate_options().spec_layout;
    let mut catalog = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let workbook = SpecWorkbook::from_bytes(&bytes)?;
        catalog.push((name, discover_styles(&workbook, &layout)));
    }
    Ok(catalog)
}

pub fn print_catalog(catalog: &[(String, Vec<StyleMarker>)]) {
    for (name, markers) in catalog {
        println!("{} ({}件)", name, markers.len());
        for marker in markers {
            println!("  {:<16} シート: {}", marker.style, marker.sheet.name);
        }
    }
}

/// シートを特定する。曖昧なら候補から選ばせる
fn resolve_sheet(
    workbook: &SpecWorkbook,
    query: &StyleQuery,
    options: &GenerateOptions,
    verbose: bool,
) -> Result<Resolved> {
    match resolve(workbook, &query.style, &options.resolve, &options.spec_layout) {
        Ok(resolved) => Ok(resolved),
        Err(Error::AmbiguousStyle { style, candidates }) => {
            if verbose {
                for c in &candidates {
                    println!("  候補: {} ({})", c.sheet.name, c.marker);
                }
            }
            let sheet = selector::select_candidate(&style, &candidates)?;
            Ok(Resolved {
                sheet,
                warning: None,
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn print_stats(stats: &ScanStats) {
    println!(
        "  走査 {}行 / 空欄 {}行 / 言語除外 {}行 / ペア {}組",
        stats.rows_scanned, stats.blank_rows, stats.language_filtered, stats.pairs_consumed
    );
}

fn print_entries(entries: &[MeasurementEntry]) {
    for (i, entry) in entries.iter().enumerate() {
        println!("  {:>3}. {:<32} {}", i + 1, entry.label, entry.value);
    }
}

/// extract --json の出力
#[derive(Debug, Serialize)]
pub struct ExtractReport {
    pub style: String,
    pub size: String,
    pub sheet: SheetRef,
    pub entries: Vec<MeasurementEntry>,
    pub stats: ScanStats,
}

/// 計測値を抽出する（QCシートは作らない）
pub fn extract(
    store: &dyn FileStore,
    args: &TargetArgs,
    config: &Config,
    verbose: bool,
) -> Result<ExtractReport> {
    let query = style_query(args, config);
    let options = generate_options(args, config);

    let (spec_name, spec) = selector::select_spec(store, args.spec.as_deref())?;
    let workbook = SpecWorkbook::from_bytes(&spec)?;
    if verbose {
        println!("  スペック表: {} ({}シート)", spec_name, workbook.sheets().len());
    }

    let resolved = resolve_sheet(&workbook, &query, &options, verbose)?;
    for warning in &resolved.warning {
        println!("⚠ {}", warning);
    }

    let spec_sheet = workbook.sheet(&resolved.sheet).ok_or_else(|| Error::SheetNotFound {
        expected: resolved.sheet.name.clone(),
    })?;
    let Extraction { entries, stats, .. } = qc_sheet_common::extract(
        spec_sheet,
        &query.size,
        query.language,
        &options.spec_layout,
        &options.extract,
    )?;

    Ok(ExtractReport {
        style: query.style,
        size: query.size,
        sheet: resolved.sheet,
        entries,
        stats,
    })
}

pub fn print_extract(report: &ExtractReport, verbose: bool) {
    println!(
        "STYLE NO {} / サイズ {} （シート: {}）",
        report.style, report.size, report.sheet.name
    );
    print_entries(&report.entries);
    if verbose {
        print_stats(&report.stats);
    }
}

/// generate の入力指定
#[derive(Debug, Clone, Default)]
pub struct GenerateInputs<'a> {
    pub template: Option<&'a str>,
    pub image: Option<&'a str>,
    pub output: Option<&'a Path>,
}

/// QCシートを生成して保存し、出力パスを返す
pub fn generate(
    store: &dyn FileStore,
    args: &TargetArgs,
    inputs: &GenerateInputs<'_>,
    config: &Config,
    verbose: bool,
) -> Result<PathBuf> {
    let query = style_query(args, config);
    let options = generate_options(args, config);

    // 1. スペック表
    println!("[1/3] スペック表を読み込み中...");
    let (spec_name, spec) = selector::select_spec(store, args.spec.as_deref())?;
    let workbook = SpecWorkbook::from_bytes(&spec)?;
    println!("✔ {} ({}シート)\n", spec_name, workbook.sheets().len());

    // 2. シート特定
    println!("[2/3] STYLE NO {} のシートを検索中...", query.style);
    let resolved = resolve_sheet(&workbook, &query, &options, verbose)?;
    for warning in &resolved.warning {
        println!("⚠ {}", warning);
    }
    println!("✔ シート: {}\n", resolved.sheet.name);

    // 3. 様式へ書き込み
    println!("[3/3] QCシートを作成中...");
    let (template_name, template) = selector::select_template(store, inputs.template)?;
    let image = selector::select_image(store, inputs.image)?;
    if verbose {
        println!("  様式: {}", template_name);
        if let Some((name, _)) = &image {
            println!("  ロゴ: {}", name);
        }
    }

    let generated: GeneratedSheet = generate_with_sheet(
        &workbook,
        resolved,
        &template,
        image.as_ref().map(|(_, bytes)| bytes.as_slice()),
        &query,
        &options,
    )?;
    println!("✔ {}件の計測値を転記", generated.entries.len());
    if verbose {
        print_entries(&generated.entries);
        print_stats(&generated.stats);
    }

    let path = output_path(inputs.output, &generated.file_name);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &generated.bytes)?;
    println!("✔ 保存: {}", path.display());

    Ok(path)
}

/// 出力先（ディレクトリ指定なら既定のファイル名を付ける）
pub fn output_path(output: Option<&Path>, file_name: &str) -> PathBuf {
    match output {
        Some(path) if path.is_dir() => path.join(file_name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(file_name),
    }
}

/// 空の様式を作る。install なら保管庫にも登録する
pub fn template_init(
    store: &mut dyn FileStore,
    output: &Path,
    install: bool,
    config: &Config,
) -> Result<()> {
    let bytes = scaffold_template(&config.template_layout)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, &bytes)?;
    println!("✔ 様式を作成: {}", output.display());

    if install {
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "qc_template.xlsx".to_string());
        let saved = store.write(Category::Template, &name, &bytes)?;
        println!("✔ template を登録: {}", saved);
    }
    Ok(())
}
