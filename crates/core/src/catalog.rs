use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// A function the model may ask to call, as advertised in `functions.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCatalogEntry {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Ordered, immutable list of functions offered on every chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FunctionCatalog {
    entries: Vec<FunctionCatalogEntry>,
}

impl FunctionCatalog {
    pub fn new(entries: Vec<FunctionCatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            ensure!(!entry.name.trim().is_empty(), "函数目录中存在空的函数名");
            ensure!(
                seen.insert(entry.name.as_str()),
                "函数目录中存在重复的函数名: {}",
                entry.name
            );
        }
        Ok(Self { entries })
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("读取函数目录失败: {}", path.display()))?;
        let catalog = Self::from_json_str(&raw)
            .with_context(|| format!("解析函数目录失败: {}", path.display()))?;

        info!(
            path = %path.display(),
            functions = catalog.len(),
            "Loaded function catalog"
        );

        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let entries: Vec<FunctionCatalogEntry> =
            serde_json::from_str(raw).context("函数目录不是合法的 JSON 数组")?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[FunctionCatalogEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
