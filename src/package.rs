// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Artifact assembly and hwcfg archive output.
//!
//! Collects every generated artifact under its fixed logical name and
//! writes the gzip-compressed tar archive that hardware initialization and
//! simulation tooling consume. Per-stage image generation has no
//! cross-stage data dependency, so it fans out over the stage index and
//! fans back in here.

use crate::compiler::Compiler;
use crate::hwspec::NUM_MAU_STAGES;
use crate::image::{gen_mau_asram, gen_mau_tcam, gen_parser_tcam, OverflowPolicy};
use crate::{metadata, report};
use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// Parser TCAM image name inside the archive.
pub const PARSER_TCAM_BIN: &str = "parser_tcam.bin";
/// PHV field map document name.
pub const PHV_MAP_JSON: &str = "phv_map.json";
/// Table registry document name.
pub const TABLE_INFO_JSON: &str = "table_info.json";
/// Action registry document name.
pub const ACTION_INFO_JSON: &str = "action_info.json";
/// Compilation report name.
pub const REPORT_FILE: &str = "dataplane.report";

/// MAU TCAM image name for one stage.
pub fn mau_tcam_name(stage: usize) -> String {
    format!("mau_tcam_init_s{}.bin", stage)
}

/// Action SRAM image name for one stage.
pub fn mau_asram_name(stage: usize) -> String {
    format!("mau_asram_init_s{}.bin", stage)
}

/// Generate every artifact of a successful compilation, keyed by its
/// archive name. The compiler must be free of fatal errors.
pub fn build_artifacts(
    cc: &Compiler,
    src_file: &str,
) -> Result<IndexMap<String, Vec<u8>>, String> {
    let mut files: IndexMap<String, Vec<u8>> = IndexMap::new();

    files.insert(
        PARSER_TCAM_BIN.to_string(),
        gen_parser_tcam(&cc.parser_states, OverflowPolicy::Drop),
    );

    let stage_images: Vec<(Vec<u8>, Vec<u8>)> = (0..NUM_MAU_STAGES)
        .into_par_iter()
        .map(|stage| (gen_mau_tcam(stage), gen_mau_asram(&cc.actions)))
        .collect();
    for (stage, (tcam, asram)) in stage_images.into_iter().enumerate() {
        files.insert(mau_tcam_name(stage), tcam);
        files.insert(mau_asram_name(stage), asram);
    }

    files.insert(PHV_MAP_JSON.to_string(), to_json(&metadata::phv_map())?);
    files.insert(
        TABLE_INFO_JSON.to_string(),
        to_json(&metadata::table_info(&cc.tables))?,
    );
    files.insert(
        ACTION_INFO_JSON.to_string(),
        to_json(&metadata::action_info(&cc.actions))?,
    );
    files.insert(
        REPORT_FILE.to_string(),
        report::gen_report(cc, src_file).into_bytes(),
    );

    Ok(files)
}

/// Write the artifacts into a gzip-compressed tar archive at `path`.
pub fn write_archive(files: &IndexMap<String, Vec<u8>>, path: &Path) -> Result<(), String> {
    let out = File::create(path)
        .map_err(|e| format!("Failed to create archive {}: {}", path.display(), e))?;
    let enc = GzEncoder::new(out, Compression::default());
    let mut builder = tar::Builder::new(enc);

    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_slice())
            .map_err(|e| format!("Failed to archive {}: {}", name, e))?;
    }

    let enc = builder
        .into_inner()
        .map_err(|e| format!("Failed to finalize archive: {}", e))?;
    enc.finish()
        .map_err(|e| format!("Failed to flush archive: {}", e))?;
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
    serde_json::to_vec_pretty(value).map_err(|e| format!("JSON serialization failed: {}", e))
}
