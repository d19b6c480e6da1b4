// SPDX-FileCopyrightText: 2023-2026 Andrew Gunnerson
// SPDX-License-Identifier: GPL-3.0-only

pub mod bootimage;
pub mod compression;
pub mod dtbo;
pub mod padding;
pub mod sparse;
pub mod vbmeta;
