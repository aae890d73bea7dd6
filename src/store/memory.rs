use super::{check_stored_name, not_found, plan_write, Category, FileStore};
use crate::error::Result;
use std::collections::BTreeMap;

/// メモリ上の保管庫（テストや一時利用向け）
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<(Category, String), Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileStore for MemoryStore {
    fn list(&self, category: Category) -> Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|(c, _)| *c == category)
            .map(|(_, name)| name.clone())
            .collect())
    }

    fn read(&self, category: Category, name: &str) -> Result<Vec<u8>> {
        check_stored_name(category, name)?;
        self.files
            .get(&(category, name.to_string()))
            .cloned()
            .ok_or_else(|| not_found(category, name))
    }

    fn write(&mut self, category: Category, name: &str, bytes: &[u8]) -> Result<String> {
        let existing = self.list(category)?;
        let (stored, replaced) = plan_write(category, &existing, name)?;

        for old in replaced {
            self.files.remove(&(category, old));
        }
        self.files.insert((category, stored.clone()), bytes.to_vec());
        Ok(stored)
    }

    fn delete(&mut self, category: Category, name: &str) -> Result<()> {
        check_stored_name(category, name)?;
        self.files
            .remove(&(category, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(category, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QcSheetError;

    #[test]
    fn test_categories_are_separate() {
        let mut store = MemoryStore::new();
        store.write(Category::Spec, "x.xlsx", b"spec").unwrap();
        store.write(Category::Template, "x.xlsx", b"template").unwrap();

        assert_eq!(store.list(Category::Spec).unwrap(), vec!["x.xlsx"]);
        assert_eq!(store.read(Category::Template, "x.xlsx").unwrap(), b"template");
        assert!(store.list(Category::Image).unwrap().is_empty());
    }

    #[test]
    fn test_same_template_name_overwrites() {
        let mut store = MemoryStore::new();
        store.write(Category::Template, "qc.xlsx", b"v1").unwrap();
        store.write(Category::Template, "qc.xlsx", b"v2").unwrap();
        assert_eq!(store.template().unwrap(), ("qc.xlsx".to_string(), b"v2".to_vec()));
    }

    #[test]
    fn test_missing_template_name() {
        let mut store = MemoryStore::new();
        store.write(Category::Template, "qc.xlsx", b"qc").unwrap();
        assert!(matches!(
            store.read(Category::Template, "other.xlsx"),
            Err(QcSheetError::FileNotFound(_))
        ));
        assert!(matches!(
            store.delete(Category::Template, "../qc.xlsx"),
            Err(QcSheetError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_missing_spec() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read(Category::Spec, "none.xlsx"),
            Err(QcSheetError::FileNotFound(_))
        ));
    }
}
