//! ビルドコンテキストの作成

use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::Builder;

const DEFAULT_DOCKERFILE: &str = "Dockerfile";
const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

/// Docker に送る tar.gz と、その中での Dockerfile のパス
#[derive(Debug)]
pub struct BuildContext {
    pub archive: Vec<u8>,
    pub dockerfile: String,
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `dockerfile` が省略された場合は `<context>/Dockerfile` を使う。
    /// コンテキスト外の Dockerfile は `Dockerfile` としてアーカイブに追加し、
    /// コンテキスト直下の `Dockerfile` は含めない。
    pub fn create_context(
        context_path: &Path,
        dockerfile_path: Option<&Path>,
    ) -> BuildResult<BuildContext> {
        if !context_path.is_dir() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }

        let dockerfile_path = dockerfile_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| context_path.join(DEFAULT_DOCKERFILE));
        if !dockerfile_path.is_file() {
            return Err(BuildError::DockerfileNotFound(dockerfile_path));
        }

        tracing::debug!("Creating build context from: {}", context_path.display());

        let inside = Self::path_in_context(context_path, &dockerfile_path);

        let mut archive = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive, Compression::default());
            let mut tar = Builder::new(encoder);

            // コンテキスト外の Dockerfile はコンテキスト直下の Dockerfile を置き換える
            let skip = inside.is_none().then_some(Path::new(DEFAULT_DOCKERFILE));
            Self::append_dir(&mut tar, context_path, context_path, skip)?;

            if inside.is_none() {
                let content = fs::read(&dockerfile_path)?;

                let mut header = tar::Header::new_gnu();
                header.set_path(DEFAULT_DOCKERFILE).map_err(|e| {
                    BuildError::InvalidConfig(format!("Failed to set Dockerfile path: {}", e))
                })?;
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();

                tar.append(&header, &content[..])?;
            }

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive.len());
        Self::check_context_size(archive.len());

        Ok(BuildContext {
            archive,
            dockerfile: inside.unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
        })
    }

    /// ディレクトリを再帰的に追加（`skip` はコンテキストからの相対パス）
    fn append_dir<W: Write>(
        tar: &mut Builder<W>,
        root: &Path,
        dir: &Path,
        skip: Option<&Path>,
    ) -> io::Result<()> {
        let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if skip == Some(relative) {
                continue;
            }

            if path.is_dir() {
                tar.append_dir(relative, &path)?;
                Self::append_dir(tar, root, &path, skip)?;
            } else {
                tar.append_path_with_name(&path, relative)?;
            }
        }
        Ok(())
    }

    /// コンテキスト内の Dockerfile なら `/` 区切りの相対パスを返す
    fn path_in_context(context_path: &Path, dockerfile_path: &Path) -> Option<String> {
        let context = context_path.canonicalize().ok()?;
        let dockerfile: PathBuf = dockerfile_path.canonicalize().ok()?;
        let relative = dockerfile.strip_prefix(&context).ok()?;

        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn check_context_size(size: usize) {
        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 .dockerignoreファイルで不要なファイルを除外することを推奨します。",
                size / 1024 / 1024
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn entries(archive: &[u8]) -> Vec<String> {
        let decoder = flate2::read::GzDecoder::new(archive);
        let mut tar = tar::Archive::new(decoder);
        tar.entries()
            .unwrap()
            .map(|e| {
                let e = e.unwrap();
                e.path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_start_matches("./")
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_create_context_with_default_dockerfile() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("file1.txt"), "content1").unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("file2.txt"), "content2").unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), "FROM alpine\nRUN echo test").unwrap();

        let context = ContextBuilder::create_context(temp_dir.path(), None).unwrap();
        assert_eq!(context.dockerfile, "Dockerfile");

        let names = entries(&context.archive);
        assert!(names.iter().any(|n| n == "Dockerfile"));
        assert!(names.iter().any(|n| n == "file1.txt"));
        assert!(names.iter().any(|n| n == "subdir/file2.txt"));
        assert_eq!(names.iter().filter(|n| *n == "Dockerfile").count(), 1);
    }

    #[test]
    fn test_create_context_with_nested_dockerfile() {
        let temp_dir = tempdir().unwrap();
        let docker_dir = temp_dir.path().join("docker");
        fs::create_dir(&docker_dir).unwrap();
        let dockerfile = docker_dir.join("app.Dockerfile");
        fs::write(&dockerfile, "FROM alpine").unwrap();

        let context = ContextBuilder::create_context(temp_dir.path(), Some(&dockerfile)).unwrap();
        assert_eq!(context.dockerfile, "docker/app.Dockerfile");
    }

    #[test]
    fn test_create_context_with_external_dockerfile() {
        let context_dir = tempdir().unwrap();
        fs::write(context_dir.path().join("app.txt"), "x").unwrap();

        let other_dir = tempdir().unwrap();
        let dockerfile = other_dir.path().join("Dockerfile.release");
        fs::write(&dockerfile, "FROM alpine").unwrap();

        let context =
            ContextBuilder::create_context(context_dir.path(), Some(&dockerfile)).unwrap();
        assert_eq!(context.dockerfile, "Dockerfile");
        assert!(entries(&context.archive).iter().any(|n| n == "Dockerfile"));
    }

    #[test]
    fn test_external_dockerfile_replaces_context_dockerfile() {
        let context_dir = tempdir().unwrap();
        fs::write(context_dir.path().join("Dockerfile"), "FROM alpine:old").unwrap();
        fs::write(context_dir.path().join("app.txt"), "x").unwrap();

        let other_dir = tempdir().unwrap();
        let dockerfile = other_dir.path().join("Dockerfile");
        fs::write(&dockerfile, "FROM alpine:new").unwrap();

        let context =
            ContextBuilder::create_context(context_dir.path(), Some(&dockerfile)).unwrap();
        assert_eq!(context.dockerfile, "Dockerfile");

        let decoder = flate2::read::GzDecoder::new(&context.archive[..]);
        let mut tar = tar::Archive::new(decoder);
        let mut dockerfiles = Vec::new();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().to_string_lossy().trim_start_matches("./") == "Dockerfile" {
                let mut content = String::new();
                std::io::Read::read_to_string(&mut entry, &mut content).unwrap();
                dockerfiles.push(content);
            }
        }
        assert_eq!(dockerfiles, vec!["FROM alpine:new".to_string()]);
        assert!(entries(&context.archive).iter().any(|n| n == "app.txt"));
    }

    #[test]
    fn test_create_context_missing_dockerfile() {
        let temp_dir = tempdir().unwrap();
        let result = ContextBuilder::create_context(temp_dir.path(), None);
        assert!(matches!(result, Err(BuildError::DockerfileNotFound(_))));
    }

    #[test]
    fn test_create_context_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        let result = ContextBuilder::create_context(&missing, None);
        assert!(matches!(result, Err(BuildError::ContextNotFound(_))));
    }
}
