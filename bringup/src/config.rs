// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    fsextract::Backend,
    kernel::{DEFAULT_MAX_DECOMPRESSED_SIZE, KernelOptions},
    locate,
    tool::{Debugfs, Dtc, Lpunpack, Mounter, Simg2img},
};

pub const CONFIG_FILE_NAME: &str = "bringup.toml";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config: {0:?}")]
    Read(PathBuf, #[source] io::Error),
    #[error("Failed to parse config: {0:?}")]
    Parse(PathBuf, #[source] toml_edit::de::Error),
    #[error("Mount timeout must be non-zero")]
    ZeroTimeout,
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseDecoderKind {
    #[default]
    Native,
    /// `simg2img`.
    External,
}

/// Program paths. Bare names are looked up in `PATH`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub simg2img: PathBuf,
    pub debugfs: PathBuf,
    pub mount: PathBuf,
    pub umount: PathBuf,
    pub dtc: PathBuf,
    pub lpunpack: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            simg2img: "simg2img".into(),
            debugfs: "debugfs".into(),
            mount: "mount".into(),
            umount: "umount".into(),
            dtc: "dtc".into(),
            lpunpack: "lpunpack".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tools: ToolPaths,
    pub mount_timeout_secs: u64,
    pub sparse_decoder: SparseDecoderKind,
    /// Filesystem extraction backends in order of preference.
    pub fs_backends: Vec<Backend>,
    /// Absolute paths inside the vendor partition to extract.
    pub vendor_paths: Vec<String>,
    pub locate_depth: usize,
    pub lz4: bool,
    pub max_decompressed_size: u64,
    /// Decompile exported device tree blobs with `dtc`.
    pub decompile_dtb: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            mount_timeout_secs: 30,
            sparse_decoder: SparseDecoderKind::default(),
            fs_backends: Backend::DEFAULT_ORDER.to_vec(),
            vendor_paths: [
                "/build.prop",
                "/etc/vintf",
                "/etc/init",
                "/etc/permissions",
                "/firmware",
                "/lib/modules",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            locate_depth: locate::DEFAULT_DEPTH,
            lz4: true,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            decompile_dtb: true,
        }
    }
}

impl Config {
    pub fn from_toml(data: &str, path: &Path) -> Result<Self> {
        let config: Self =
            toml_edit::de::from_str(data).map_err(|e| Error::Parse(path.to_owned(), e))?;

        if config.mount_timeout_secs == 0 {
            return Err(Error::ZeroTimeout);
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| Error::Read(path.to_owned(), e))?;

        Self::from_toml(&data, path)
    }

    /// Load `path` if given. Otherwise, load [`CONFIG_FILE_NAME`] from
    /// `fallback_dir` if it exists, or use the defaults.
    pub fn load_or_default(path: Option<&Path>, fallback_dir: &Path) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        let candidate = fallback_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn kernel_options(&self) -> KernelOptions {
        KernelOptions {
            lz4: self.lz4,
            max_decompressed_size: self.max_decompressed_size,
        }
    }

    pub fn mount_timeout(&self) -> Duration {
        Duration::from_secs(self.mount_timeout_secs)
    }

    pub fn simg2img(&self) -> Simg2img {
        Simg2img {
            program: self.tools.simg2img.clone(),
        }
    }

    pub fn debugfs(&self) -> Debugfs {
        Debugfs {
            program: self.tools.debugfs.clone(),
        }
    }

    pub fn mounter(&self) -> Mounter {
        Mounter {
            mount_program: self.tools.mount.clone(),
            umount_program: self.tools.umount.clone(),
            timeout: self.mount_timeout(),
        }
    }

    pub fn dtc(&self) -> Dtc {
        Dtc {
            program: self.tools.dtc.clone(),
        }
    }

    pub fn lpunpack(&self) -> Lpunpack {
        Lpunpack {
            program: self.tools.lpunpack.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config = Config::from_toml(
            r#"
                mount_timeout_secs = 5
                fs_backends = ["offline_dump"]
                vendor_paths = ["/etc/vintf"]

                [tools]
                debugfs = "/sbin/debugfs"
            "#,
            Path::new("bringup.toml"),
        )
        .unwrap();

        assert_eq!(config.mount_timeout(), Duration::from_secs(5));
        assert_eq!(config.fs_backends, [Backend::OfflineDump]);
        assert_eq!(config.vendor_paths, ["/etc/vintf"]);
        assert_eq!(config.tools.debugfs, Path::new("/sbin/debugfs"));
        assert_eq!(config.tools.dtc, Path::new("dtc"));
        assert_eq!(config.sparse_decoder, SparseDecoderKind::Native);
        assert!(config.lz4);

        let round_trip = toml_edit::ser::to_string_pretty(&config).unwrap();
        assert_eq!(
            Config::from_toml(&round_trip, Path::new("bringup.toml")).unwrap(),
            config,
        );
    }

    #[test]
    fn invalid_config() {
        let path = Path::new("bringup.toml");

        assert_matches!(
            Config::from_toml("mount_timeout_secs = 0", path),
            Err(Error::ZeroTimeout)
        );
        assert_matches!(
            Config::from_toml("unknown_key = true", path),
            Err(Error::Parse(..))
        );
        assert_matches!(
            Config::from_toml("[tools]\nfastboot = \"fastboot\"", path),
            Err(Error::Parse(..))
        );
    }

    #[test]
    fn fallback_file() {
        let temp_dir = tempfile::tempdir().unwrap();

        assert_eq!(
            Config::load_or_default(None, temp_dir.path()).unwrap(),
            Config::default(),
        );

        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "lz4 = false").unwrap();
        assert!(!Config::load_or_default(None, temp_dir.path()).unwrap().lz4);

        assert_matches!(
            Config::load_or_default(Some(&temp_dir.path().join("missing.toml")), temp_dir.path()),
            Err(Error::Read(..))
        );
    }
}
