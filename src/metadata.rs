// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Metadata documents for downstream tooling.
//!
//! Three JSON documents are the canonical interface the control plane,
//! simulator, and test harnesses consume: where PHV fields live, how
//! tables are placed and addressed, and what each action id executes.
//! Maps are keyed by name and serialize in registry order.

use crate::hwspec::PHV_FIELDS;
use crate::ir::{ActionDef, ActionPrimitive, MatchKind, TableDef};
use indexmap::IndexMap;
use serde::Serialize;

/// One PHV field's placement.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhvFieldInfo {
    pub offset: u16,
    pub width: u16,
}

/// One table's placement and addressing, as exported to tooling.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub stage: u32,
    pub table_id: u32,
    pub match_type: MatchKind,
    pub size: u32,
    pub key_fields: Vec<String>,
    pub actions: Vec<String>,
}

/// One action's id, parameters and micro-operations, as exported to
/// tooling.
#[derive(Debug, Clone, Serialize)]
pub struct ActionInfo {
    pub action_id: u16,
    pub params: Vec<String>,
    pub primitives: Vec<ActionPrimitive>,
}

/// The static PHV field map document.
pub fn phv_map() -> IndexMap<String, PhvFieldInfo> {
    PHV_FIELDS
        .iter()
        .map(|&(name, offset, width)| (name.to_string(), PhvFieldInfo { offset, width }))
        .collect()
}

/// The table registry document.
pub fn table_info(tables: &IndexMap<String, TableDef>) -> IndexMap<String, TableInfo> {
    tables
        .iter()
        .map(|(name, t)| {
            (
                name.clone(),
                TableInfo {
                    stage: t.stage.unwrap_or(0),
                    table_id: t.table_id,
                    match_type: t.match_kind,
                    size: t.size,
                    key_fields: t.key_fields.clone(),
                    actions: t.actions.clone(),
                },
            )
        })
        .collect()
}

/// The action registry document.
pub fn action_info(actions: &IndexMap<String, ActionDef>) -> IndexMap<String, ActionInfo> {
    actions
        .iter()
        .map(|(name, a)| {
            (
                name.clone(),
                ActionInfo {
                    action_id: a.action_id,
                    params: a.params.clone(),
                    primitives: a.primitives.clone(),
                },
            )
        })
        .collect()
}
