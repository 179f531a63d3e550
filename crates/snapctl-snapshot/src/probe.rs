//! Content-type detection for diff candidates.

use crate::SnapshotResult;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Decides whether a file should be diffed as text.
#[async_trait]
pub trait ContentProbe: Send + Sync {
    async fn is_text(&self, path: &Path) -> SnapshotResult<bool>;
}

/// Probe backed by the host's `file` utility (`file -bi`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCommandProbe;

impl FileCommandProbe {
    /// Check whether `file` can be executed on this host.
    pub async fn is_available() -> bool {
        match Command::new("file").arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ContentProbe for FileCommandProbe {
    async fn is_text(&self, path: &Path) -> SnapshotResult<bool> {
        let output = Command::new("file").arg("-bi").arg(path).output().await?;
        Ok(String::from_utf8_lossy(&output.stdout).starts_with("text"))
    }
}

/// In-process probe: a file is binary if its first 8 KiB contain a NUL byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct SniffProbe;

const SNIFF_LEN: usize = 8 * 1024;

#[async_trait]
impl ContentProbe for SniffProbe {
    async fn is_text(&self, path: &Path) -> SnapshotResult<bool> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut buf = vec![0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(!buf[..filled].contains(&0))
    }
}
