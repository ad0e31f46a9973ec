//! イメージ ID ファイルの読み書き
//!
//! ビルド結果のイメージ ID をファイルに残し、次回の up-to-date 判定に使う。

use crate::error::BuildResult;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// イメージ ID を書き込む（親ディレクトリがなければ作成）
pub fn write_id(path: &Path, image_id: &str) -> BuildResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, image_id)?;
    tracing::debug!("Wrote image id {} to {}", image_id, path.display());
    Ok(())
}

/// イメージ ID を読み込む
///
/// ファイルがない、または空の場合は `None`
pub fn read_id(path: &Path) -> BuildResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let id = content.trim();
            Ok((!id.is_empty()).then(|| id.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_id_creates_parent_directories() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("build").join("docker").join("image-id.txt");

        write_id(&path, "sha256:0123abcd").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "sha256:0123abcd");
    }

    #[test]
    fn test_write_id_overwrites() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("image-id.txt");

        write_id(&path, "sha256:old").unwrap();
        write_id(&path, "sha256:new").unwrap();

        assert_eq!(read_id(&path).unwrap().as_deref(), Some("sha256:new"));
    }

    #[test]
    fn test_read_id_missing_or_empty() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("image-id.txt");
        assert_eq!(read_id(&path).unwrap(), None);

        fs::write(&path, "  \n").unwrap();
        assert_eq!(read_id(&path).unwrap(), None);
    }

    #[test]
    fn test_read_id_trims_whitespace() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("image-id.txt");
        fs::write(&path, "sha256:abc\n").unwrap();
        assert_eq!(read_id(&path).unwrap().as_deref(), Some("sha256:abc"));
    }
}
