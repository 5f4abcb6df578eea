// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Compiler intermediate representation.
//!
//! These are the symbol definitions the classifier builds from annotated
//! source and the allocator mutates before image generation: match tables,
//! actions (with their ALU micro-operations), and parser transition rules.
//! The builtin action library lives here as a process-wide read-only seed.

use crate::hwspec::{phv_field, AluOp};
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::OnceLock;

/// One attribute occurrence attached to a function declaration,
/// e.g. `rvp4_stage(3)` has name `rvp4_stage` and args `["3"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Find an attribute by name in an extracted attribute list.
pub fn get_attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a Attribute> {
    attrs.iter().find(|a| a.name == name)
}

/// One hardware ALU micro-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionPrimitive {
    /// Opcode, one of the [`AluOp`] values.
    pub op: u8,
    /// Destination byte offset in the PHV (or metadata, per opcode).
    pub dst_off: u16,
    /// Source byte offset in the PHV.
    pub src_off: u16,
    /// Immediate operand.
    pub imm_val: u32,
    /// Operand width in bytes.
    pub fwidth: u8,
}

impl ActionPrimitive {
    /// A primitive with the given opcode and all operands zeroed
    /// (field width defaults to 4 bytes).
    pub fn from_op(op: AluOp) -> Self {
        Self {
            op: op as u8,
            dst_off: 0,
            src_off: 0,
            imm_val: 0,
            fwidth: 4,
        }
    }
}

/// A named action bound to a 16-bit action id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDef {
    pub name: String,
    pub action_id: u16,
    /// Ordered micro-operations. The action SRAM encodes only the first
    /// one (single micro-op per slot, see [`crate::image`]).
    pub primitives: Vec<ActionPrimitive>,
    /// Ordered parameter names, for the control plane.
    pub params: Vec<String>,
}

/// Supported match table lookup kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Lpm,
    Ternary,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Lpm => write!(f, "lpm"),
            MatchKind::Ternary => write!(f, "ternary"),
        }
    }
}

/// A named match table bound to one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    /// Pipeline stage. `None` until the allocator assigns one.
    pub stage: Option<u32>,
    pub table_id: u32,
    pub match_kind: MatchKind,
    /// Requested entry count; clamped to the TCAM depth during validation.
    pub size: u32,
    pub key_fields: Vec<String>,
    pub actions: Vec<String>,
}

/// A parser transition rule, one TCAM entry worth of state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    pub name: String,
    pub state_id: u16,
    /// Byte offset in the match cell.
    pub key_offset: u16,
    pub key_len: u16,
    pub key_val: u64,
    pub key_mask: u64,
    pub next_state: u16,
    pub extract_offset: u16,
    pub extract_len: u16,
    pub phv_dst_offset: u16,
    pub hdr_advance: u16,
}

fn builtin(
    name: &str,
    action_id: u16,
    primitives: Vec<ActionPrimitive>,
    params: &[&str],
) -> (String, ActionDef) {
    (
        name.to_string(),
        ActionDef {
            name: name.to_string(),
            action_id,
            primitives,
            params: params.iter().map(|s| s.to_string()).collect(),
        },
    )
}

/// The builtin action library: actions every data plane program can bind
/// without declaring. Constructed once per process; each compilation seeds
/// its private action registry with a copy, and a user action declared
/// under a builtin name does not replace the builtin definition.
pub fn builtin_actions() -> &'static IndexMap<String, ActionDef> {
    static BUILTINS: OnceLock<IndexMap<String, ActionDef>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        let (ttl_off, _) = phv_field("ipv4_ttl").expect("PHV map is missing ipv4_ttl");
        let (dscp_off, _) = phv_field("ipv4_dscp").expect("PHV map is missing ipv4_dscp");
        IndexMap::from_iter([
            builtin(
                "forward",
                0x1001,
                vec![ActionPrimitive {
                    op: AluOp::SetPort as u8,
                    dst_off: 0,
                    src_off: 0,
                    imm_val: 0,
                    fwidth: 1,
                }],
                &["port"],
            ),
            builtin(
                "drop",
                0x1002,
                vec![ActionPrimitive::from_op(AluOp::Drop)],
                &[],
            ),
            builtin(
                "permit",
                0x2001,
                vec![ActionPrimitive::from_op(AluOp::Nop)],
                &[],
            ),
            builtin(
                "deny",
                0x2002,
                vec![ActionPrimitive::from_op(AluOp::Drop)],
                &[],
            ),
            builtin(
                "l2_forward",
                0x3001,
                vec![ActionPrimitive {
                    op: AluOp::SetPort as u8,
                    dst_off: 0,
                    src_off: 0,
                    imm_val: 0,
                    fwidth: 1,
                }],
                &["port"],
            ),
            builtin(
                "flood",
                0x3002,
                vec![ActionPrimitive::from_op(AluOp::Nop)],
                &[],
            ),
            builtin(
                "set_ttl_dec",
                0x4001,
                // TTL decrement as +0xFFFFFFFF over a 1-byte field (wraps to -1).
                vec![ActionPrimitive {
                    op: AluOp::Add as u8,
                    dst_off: ttl_off,
                    src_off: 0,
                    imm_val: 0xFFFF_FFFF,
                    fwidth: 1,
                }],
                &[],
            ),
            builtin(
                "set_dscp",
                0x4002,
                vec![ActionPrimitive {
                    op: AluOp::Set as u8,
                    dst_off: dscp_off,
                    src_off: 0,
                    imm_val: 0,
                    fwidth: 1,
                }],
                &["dscp"],
            ),
            builtin(
                "nop",
                0x0000,
                vec![ActionPrimitive::from_op(AluOp::Nop)],
                &[],
            ),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwspec::USER_ACTION_ID_BASE;

    #[test]
    fn test_get_attr() {
        let attrs = vec![
            Attribute::new("rvp4_table", vec![]),
            Attribute::new("rvp4_stage", vec!["3".to_string()]),
        ];
        assert!(get_attr(&attrs, "rvp4_table").is_some());
        assert_eq!(
            get_attr(&attrs, "rvp4_stage").unwrap().args,
            vec!["3".to_string()]
        );
        assert!(get_attr(&attrs, "rvp4_size").is_none());
    }

    #[test]
    fn test_builtin_ids_unique_and_below_user_range() {
        let builtins = builtin_actions();
        let mut seen = std::collections::HashSet::new();
        for a in builtins.values() {
            assert!(seen.insert(a.action_id), "duplicate id {:#06x}", a.action_id);
            assert!(a.action_id < USER_ACTION_ID_BASE);
        }
    }

    #[test]
    fn test_builtin_library_contents() {
        let builtins = builtin_actions();
        assert_eq!(builtins.len(), 9);

        let drop = &builtins["drop"];
        assert_eq!(drop.action_id, 0x1002);
        assert_eq!(drop.primitives.len(), 1);
        assert_eq!(drop.primitives[0].op, AluOp::Drop as u8);

        let fwd = &builtins["forward"];
        assert_eq!(fwd.action_id, 0x1001);
        assert_eq!(fwd.params, vec!["port".to_string()]);

        let ttl = &builtins["set_ttl_dec"];
        assert_eq!(ttl.primitives[0].dst_off, 26);
        assert_eq!(ttl.primitives[0].imm_val, 0xFFFF_FFFF);
        assert_eq!(ttl.primitives[0].fwidth, 1);

        assert_eq!(builtins["nop"].action_id, 0x0000);
    }
}
