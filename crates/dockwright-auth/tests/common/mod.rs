use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// config.json と credential helper スクリプトを置くテスト用ディレクトリ
pub struct DockerHome {
    pub root: TempDir,
}

impl DockerHome {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("config.json")
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    /// helper コマンドのプレフィックス (`<root>/bin/docker-credential-`)
    pub fn helper_prefix(&self) -> String {
        format!("{}/docker-credential-", self.bin_dir().display())
    }

    /// `docker-credential-<name>` として実行されるシェルスクリプトを作成
    #[cfg(unix)]
    pub fn write_helper(&self, name: &str, script: &str) {
        use std::os::unix::fs::PermissionsExt;

        fs::create_dir_all(self.bin_dir()).unwrap();
        let path = self.bin_dir().join(format!("docker-credential-{}", name));
        fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    fn bin_dir(&self) -> PathBuf {
        self.root.path().join("bin")
    }
}
