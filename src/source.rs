//! Document I/O: where the text buffer comes from and where results go.
//!
//! The runtime depends on the `TextSource` abstraction rather than on a
//! concrete reader, so files and stdin are interchangeable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

#[async_trait::async_trait]
pub trait TextSource {
    async fn read_text(&self) -> Result<String>;
    fn describe(&self) -> String;
}

pub struct FileSource {
    pub path: PathBuf,
}

#[async_trait::async_trait]
impl TextSource for FileSource {
    async fn read_text(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

pub struct StdinSource;

#[async_trait::async_trait]
impl TextSource for StdinSource {
    async fn read_text(&self) -> Result<String> {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("reading stdin")?;
        Ok(buf)
    }

    fn describe(&self) -> String {
        "<stdin>".to_owned()
    }
}

/// `-` means stdin, anything else is a file path.
pub fn source_for(path: &Path) -> Box<dyn TextSource + Send + Sync> {
    if path.as_os_str() == "-" {
        Box::new(StdinSource)
    } else {
        Box::new(FileSource {
            path: path.to_path_buf(),
        })
    }
}

pub async fn load_text(path: &Path) -> Result<String> {
    let source = source_for(path);
    let text = source.read_text().await?;
    debug!(source = %source.describe(), bytes = text.len(), "loaded document");
    Ok(text)
}

/// Overwrite `path` with `text`, via a sibling temporary file.
pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("{} is not a file path", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".rtmark.tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp)
        .await
        .with_context(|| format!("creating {}", tmp.display()))?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    drop(file);
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))
}

pub async fn write_stdout(text: &str) -> Result<()> {
    let mut out = tokio::io::stdout();
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}
