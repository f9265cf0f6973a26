use crate::core::Storage;
use crate::utils::error::Result;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(self.resolve(path))?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);
        Self::ensure_parent(&full_path)?;
        fs::write(full_path, data)?;
        Ok(())
    }

    async fn append_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.resolve(path);
        Self::ensure_parent(&full_path)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(full_path)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).try_exists()?)
    }
}
