// SPDX-FileCopyrightText: 2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

//! State shared by every step of a run. Nothing here is global: the CLI builds
//! a [`RunContext`] and passes it down explicitly.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::AtomicBool,
};

use crate::{
    artifact::ArtifactKind,
    config::{Config, SparseDecoderKind},
    convert::{NativeSparseDecoder, SparseDecoder},
    fsextract::Capabilities,
    report::{Aggregator, SUMMARY_FILE_NAME},
    tool::{
        Debugfs, DtbDecompiler, Dtc, FsIntrospect, LoopMount, Lpunpack, Mounter, Simg2img,
        Unpacker,
    },
};

/// Fixed directory structure under the output root. Every step writes below
/// its own directory, so reruns overwrite instead of accumulating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inputs produced by unpackers and cached conversions.
    pub fn staging(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn preserved(&self) -> PathBuf {
        self.root.join("preserved")
    }

    pub fn extracted(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join("extracted").join(kind.name())
    }

    pub fn signals(&self) -> PathBuf {
        self.root.join("signals")
    }

    pub fn summary(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE_NAME)
    }

    /// Cache file for the raw form of a sparse image.
    pub fn raw_cache(&self, kind: ArtifactKind) -> PathBuf {
        self.staging().join(format!("{}.raw", kind.name()))
    }

    pub fn create(&self) -> io::Result<()> {
        for dir in [self.staging(), self.preserved(), self.root.join("extracted")] {
            fs::create_dir_all(dir)?;
        }

        Ok(())
    }
}

/// The capability implementations used by a run.
#[derive(Clone, Copy)]
pub struct Tools<'a> {
    pub sparse_decoder: &'a dyn SparseDecoder,
    pub dtb_decompiler: Option<&'a dyn DtbDecompiler>,
    pub super_unpacker: &'a dyn Unpacker,
    pub mount: &'a dyn LoopMount,
    pub introspect: &'a dyn FsIntrospect,
}

impl<'a> Tools<'a> {
    pub fn fs_capabilities(&self) -> Capabilities<'a> {
        Capabilities {
            mount: self.mount,
            introspect: self.introspect,
        }
    }
}

/// Process-backed capabilities configured from a [`Config`].
#[derive(Clone, Debug)]
pub struct SystemTools {
    native_sparse: NativeSparseDecoder,
    simg2img: Simg2img,
    sparse_decoder: SparseDecoderKind,
    dtc: Dtc,
    decompile_dtb: bool,
    lpunpack: Lpunpack,
    mounter: Mounter,
    debugfs: Debugfs,
}

impl SystemTools {
    pub fn new(config: &Config) -> Self {
        Self {
            native_sparse: NativeSparseDecoder,
            simg2img: config.simg2img(),
            sparse_decoder: config.sparse_decoder,
            dtc: config.dtc(),
            decompile_dtb: config.decompile_dtb,
            lpunpack: config.lpunpack(),
            mounter: config.mounter(),
            debugfs: config.debugfs(),
        }
    }

    pub fn tools(&self) -> Tools<'_> {
        let sparse_decoder: &dyn SparseDecoder = match self.sparse_decoder {
            SparseDecoderKind::Native => &self.native_sparse,
            SparseDecoderKind::External => &self.simg2img,
        };

        Tools {
            sparse_decoder,
            dtb_decompiler: self
                .decompile_dtb
                .then_some(&self.dtc as &dyn DtbDecompiler),
            super_unpacker: &self.lpunpack,
            mount: &self.mounter,
            introspect: &self.debugfs,
        }
    }
}

pub struct RunContext<'a> {
    pub layout: OutputLayout,
    pub config: Config,
    pub aggregator: Aggregator,
    pub cancel_signal: &'a AtomicBool,
}

impl<'a> RunContext<'a> {
    pub fn new(output_root: &Path, config: Config, cancel_signal: &'a AtomicBool) -> Self {
        Self {
            layout: OutputLayout::new(output_root),
            config,
            aggregator: Aggregator::new(),
            cancel_signal,
        }
    }
}
