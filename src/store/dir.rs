use super::{check_stored_name, not_found, plan_write, Category, FileStore};
use crate::error::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// フォルダに保存する保管庫（`<root>/spec`, `<root>/template`, `<root>/image`）
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// 保存済みファイルのフルパス（種別フォルダの直下に限る）
    pub fn path_of(&self, category: Category, name: &str) -> Result<PathBuf> {
        check_stored_name(category, name)?;
        let path = self.dir(category).join(name);
        if !path.is_file() {
            return Err(not_found(category, name));
        }
        Ok(path)
    }
}

impl FileStore for DirStore {
    fn list(&self, category: Category) -> Result<Vec<String>> {
        let dir = self.dir(category);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.file_name().to_string_lossy().to_string())
            // Excel の一時ファイル（~$xxx.xlsx）は除外
            .filter(|name| !name.starts_with("~$") && category.accepts(name))
            .collect();

        names.sort();
        Ok(names)
    }

    fn read(&self, category: Category, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(category, name)?;
        Ok(std::fs::read(path)?)
    }

    fn write(&mut self, category: Category, name: &str, bytes: &[u8]) -> Result<String> {
        let existing = self.list(category)?;
        let (stored, replaced) = plan_write(category, &existing, name)?;

        let dir = self.dir(category);
        std::fs::create_dir_all(&dir)?;

        // 新しいファイルを書けてから古い様式を消す
        std::fs::write(dir.join(&stored), bytes)?;
        for old in replaced.iter().filter(|old| **old != stored) {
            std::fs::remove_file(dir.join(old))?;
        }
        Ok(stored)
    }

    fn delete(&mut self, category: Category, name: &str) -> Result<()> {
        let path = self.path_of(category, name)?;
        std::fs::remove_file(path)?;
        Ok(())
    }
}
