//! 入力ファイル・候補シートの選択
//!
//! 保管庫の名前でもファイルパスでも指定できる。指定がなく複数あるときは対話式で選ぶ。

use crate::error::{QcSheetError, Result};
use crate::store::{Category, FileStore};
use dialoguer::Select;
use qc_sheet_common::{SheetCandidate, SheetRef};
use std::path::Path;

/// 指定なしのときの選び方
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    /// そのまま使う
    Use(String),
    /// 利用者に選ばせる
    Ask(Vec<String>),
}

/// 登録済みの一覧から選び方を決める（1件ならそれを使う）
pub fn choose(category: Category, names: &[String]) -> Result<Choice> {
    match names {
        [] => Err(QcSheetError::StoreEmpty(category.to_string())),
        [only] => Ok(Choice::Use(only.clone())),
        _ => Ok(Choice::Ask(names.to_vec())),
    }
}

/// 指定値を読み込む。保管庫の名前を優先し、無ければファイルパスとして読む
pub fn load_named(
    store: &dyn FileStore,
    category: Category,
    value: &str,
) -> Result<(String, Vec<u8>)> {
    if store.list(category)?.iter().any(|name| name == value) {
        return Ok((value.to_string(), store.read(category, value)?));
    }

    let path = Path::new(value);
    if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| value.to_string());
        return Ok((name, std::fs::read(path)?));
    }

    Err(QcSheetError::FileNotFound(format!("{}/{}", category, value)))
}

/// スペック表を決める（--spec > 1件のみ > 対話式）
pub fn select_spec(store: &dyn FileStore, requested: Option<&str>) -> Result<(String, Vec<u8>)> {
    if let Some(value) = requested {
        return load_named(store, Category::Spec, value);
    }

    let names = store.list(Category::Spec)?;
    let name = match choose(Category::Spec, &names)? {
        Choice::Use(name) => name,
        Choice::Ask(names) => {
            let index = prompt("スペック表を選択してください", &names)?;
            names[index].clone()
        }
    };
    let bytes = store.read(Category::Spec, &name)?;
    Ok((name, bytes))
}

/// 様式を決める（--template > 登録済み）
pub fn select_template(store: &dyn FileStore, requested: Option<&str>) -> Result<(String, Vec<u8>)> {
    match requested {
        Some(value) => load_named(store, Category::Template, value),
        None => store.template(),
    }
}

/// ロゴ画像（--image 指定時のみ）
pub fn select_image(
    store: &dyn FileStore,
    requested: Option<&str>,
) -> Result<Option<(String, Vec<u8>)>> {
    requested
        .map(|value| load_named(store, Category::Image, value))
        .transpose()
}

/// 曖昧一致の候補からシートを選ぶ
pub fn select_candidate(style: &str, candidates: &[SheetCandidate]) -> Result<SheetRef> {
    let items: Vec<String> = candidates
        .iter()
        .map(|c| format!("{} （{}）", c.sheet.name, c.marker))
        .collect();

    println!("⚠ STYLE NO '{}' に一致するシートが複数あります", style);
    let index = prompt("使用するシートを選択してください", &items)?;
    Ok(candidates[index].sheet.clone())
}

/// 選ばれた項目の位置（Esc / q は Prompt エラー）
fn prompt(message: &str, items: &[String]) -> Result<usize> {
    let index = Select::new()
        .with_prompt(message)
        .items(items)
        .default(0)
        .interact_opt()
        .map_err(|e| QcSheetError::Prompt(e.to_string()))?
        .ok_or_else(|| QcSheetError::Prompt(message.to_string()))?;

    println!("→ {} を使用", items[index]);
    Ok(index)
}
