//! ファイル保管庫
//!
//! スペック表・QCシート様式・ロゴ画像を種別ごとに保管する。
//! - 様式は常に1ファイルだけ（新しく登録すると置き換わる）
//! - 画像は同名があれば `名前_1.png`, `名前_2.png` … と採番する

mod dir;
mod memory;

pub use dir::DirStore;
pub use memory::MemoryStore;

use crate::error::{QcSheetError, Result};
use std::path::Path;

/// 保管する種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Spec,
    Template,
    Image,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Spec, Category::Template, Category::Image];

    /// 保存先のサブフォルダ名
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Spec => "spec",
            Category::Template => "template",
            Category::Image => "image",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Spec | Category::Template => &["xlsx"],
            Category::Image => &["png", "jpg", "jpeg"],
        }
    }

    /// 拡張子が種別に合っているか（大文字小文字は区別しない）
    pub fn accepts(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions().iter().any(|e| *e == ext)
            })
            .unwrap_or(false)
    }
}

impl std::str::FromStr for Category {
    type Err = QcSheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "spec" | "specs" | "s" => Ok(Category::Spec),
            "template" | "templates" | "t" => Ok(Category::Template),
            "image" | "images" | "logo" | "i" => Ok(Category::Image),
            _ => Err(QcSheetError::InvalidCategory(s.to_string())),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// ファイル保管庫
pub trait FileStore {
    /// 名前順の一覧
    fn list(&self, category: Category) -> Result<Vec<String>>;

    fn read(&self, category: Category, name: &str) -> Result<Vec<u8>>;

    /// 保存して、実際に保存した名前を返す
    fn write(&mut self, category: Category, name: &str, bytes: &[u8]) -> Result<String>;

    fn delete(&mut self, category: Category, name: &str) -> Result<()>;

    /// 登録済みの様式（無ければ TemplateMissing）
    fn template(&self) -> Result<(String, Vec<u8>)> {
        let name = self
            .list(Category::Template)?
            .into_iter()
            .next()
            .ok_or(QcSheetError::Core(qc_sheet_common::Error::TemplateMissing))?;
        let bytes = self.read(Category::Template, &name)?;
        Ok((name, bytes))
    }
}

/// アップロード名からファイル名部分だけを取り出し、拡張子を確認する
pub fn sanitize_name(category: Category, name: &str) -> Result<String> {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().trim().to_string())
        .unwrap_or_default();

    if file_name.is_empty() || file_name.starts_with('.') {
        return Err(QcSheetError::UnsupportedFile(name.to_string()));
    }
    if !category.accepts(&file_name) {
        return Err(QcSheetError::UnsupportedFile(format!(
            "{}（{} は {} のみ）",
            file_name,
            category,
            category.extensions().join(" / ")
        )));
    }
    Ok(file_name)
}

/// 保管庫内のファイル名として読み書きできるか確認する。
/// 区切り文字や `..` を含む名前は保管庫の外を指すので、見つからない扱い
pub(crate) fn check_stored_name(category: Category, name: &str) -> Result<()> {
    match sanitize_name(category, name) {
        Ok(file_name) if file_name == name => Ok(()),
        _ => Err(not_found(category, name)),
    }
}

pub(crate) fn not_found(category: Category, name: &str) -> QcSheetError {
    QcSheetError::FileNotFound(format!("{}/{}", category, name))
}

/// 既存と重ならない名前（`stem_1.ext`, `stem_2.ext`, …）
pub fn unique_name(existing: &[String], name: &str) -> String {
    if !existing.iter().any(|e| e == name) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| format!("{}_{}{}", stem, n, ext))
        .find(|candidate| !existing.iter().any(|e| e == candidate))
        .unwrap_or_else(|| name.to_string())
}

/// 種別ごとの保存名を決める。様式は置き換え対象（既存の様式名）も返す
pub(crate) fn plan_write(
    category: Category,
    existing: &[String],
    name: &str,
) -> Result<(String, Vec<String>)> {
    let name = sanitize_name(category, name)?;
    match category {
        Category::Spec => Ok((name, Vec::new())),
        Category::Template => Ok((name, existing.to_vec())),
        Category::Image => Ok((unique_name(existing, &name), Vec::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str() {
        assert_eq!("spec".parse::<Category>().unwrap(), Category::Spec);
        assert_eq!("Template".parse::<Category>().unwrap(), Category::Template);
        assert_eq!("logo".parse::<Category>().unwrap(), Category::Image);
        assert!(matches!(
            "pdf".parse::<Category>(),
            Err(QcSheetError::InvalidCategory(ref c)) if c == "pdf"
        ));
    }

    #[test]
    fn test_category_accepts() {
        assert!(Category::Spec.accepts("JXF_SPEC.XLSX"));
        assert!(!Category::Spec.accepts("spec.csv"));
        assert!(Category::Image.accepts("logo.JPG"));
        assert!(!Category::Image.accepts("logo.gif"));
        assert!(!Category::Image.accepts("logo"));
    }

    #[test]
    fn test_unique_name() {
        let existing = vec!["logo.png".to_string(), "logo_1.png".to_string()];
        assert_eq!(unique_name(&existing, "logo.png"), "logo_2.png");
        assert_eq!(unique_name(&existing, "brand.png"), "brand.png");
    }

    #[test]
    fn test_sanitize_name_strips_directories() {
        assert_eq!(
            sanitize_name(Category::Spec, "/tmp/upload/spec.xlsx").unwrap(),
            "spec.xlsx"
        );
        assert!(matches!(
            sanitize_name(Category::Spec, "../"),
            Err(QcSheetError::UnsupportedFile(_))
        ));
        assert!(sanitize_name(Category::Template, "template.xls").is_err());
    }

    #[test]
    fn test_check_stored_name() {
        assert!(check_stored_name(Category::Spec, "spec.xlsx").is_ok());
        for name in ["../../victim.xlsx", "/etc/spec.xlsx", "sub/spec.xlsx", "..", ".xlsx", " spec.xlsx"] {
            assert!(
                matches!(check_stored_name(Category::Spec, name), Err(QcSheetError::FileNotFound(_))),
                "{} は保管庫の名前として通らない",
                name
            );
        }
    }

    #[test]
    fn test_plan_write_template_replaces() {
        let existing = vec!["old.xlsx".to_string()];
        let (name, replaced) = plan_write(Category::Template, &existing, "new.xlsx").unwrap();
        assert_eq!(name, "new.xlsx");
        assert_eq!(replaced, existing);
    }
}
