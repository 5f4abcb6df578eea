// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Hardware pipeline parameters shared with the RTL (rv_p4_pkg.sv).
//!
//! Every constant here is a bit-exact contract with the hardware: the
//! initialization images produced by [`crate::image`] are loaded into the
//! parser TCAM and the per-stage MAU memories verbatim, so none of these
//! values may drift from the RTL package.

/// Number of match-action stages in the pipeline.
pub const NUM_MAU_STAGES: usize = 24;

/// Parser TCAM entry count.
pub const PARSER_TCAM_DEPTH: usize = 256;

/// Parser TCAM entry width in bits.
pub const PARSER_TCAM_WIDTH: usize = 640;

/// Per-stage MAU TCAM entry count.
pub const MAU_TCAM_DEPTH: usize = 2048;

/// MAU TCAM match key width in bits.
pub const MAU_TCAM_KEY_W: usize = 512;

/// Per-stage action SRAM entry count.
pub const MAU_ASRAM_DEPTH: usize = 65536;

/// Action SRAM entry width in bits.
pub const MAU_ASRAM_WIDTH: usize = 128;

/// Packet header vector size in bytes.
pub const PHV_BYTES: usize = 512;

/// First action id of the range reserved for user-defined actions.
/// Builtin actions live below this value.
pub const USER_ACTION_ID_BASE: u16 = 0x5000;

/// ALU micro-operation opcodes (mau_alu.sv).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AluOp {
    Nop = 0x0,
    Set = 0x1,
    Copy = 0x2,
    Add = 0x3,
    Sub = 0x4,
    And = 0x5,
    Or = 0x6,
    Xor = 0x7,
    SetMeta = 0x8,
    Drop = 0x9,
    SetPort = 0xA,
    SetPrio = 0xB,
    HashSet = 0xC,
    CondSet = 0xD,
}

impl TryFrom<u8> for AluOp {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(AluOp::Nop),
            0x1 => Ok(AluOp::Set),
            0x2 => Ok(AluOp::Copy),
            0x3 => Ok(AluOp::Add),
            0x4 => Ok(AluOp::Sub),
            0x5 => Ok(AluOp::And),
            0x6 => Ok(AluOp::Or),
            0x7 => Ok(AluOp::Xor),
            0x8 => Ok(AluOp::SetMeta),
            0x9 => Ok(AluOp::Drop),
            0xA => Ok(AluOp::SetPort),
            0xB => Ok(AluOp::SetPrio),
            0xC => Ok(AluOp::HashSet),
            0xD => Ok(AluOp::CondSet),
            _ => Err(()),
        }
    }
}

/// PHV field layout: (name, byte offset, byte width).
///
/// Matches the firmware's table_map.h. TCP and UDP ports alias the same
/// offsets because at most one L4 header is extracted per packet.
pub const PHV_FIELDS: &[(&str, u16, u16)] = &[
    ("eth_dst", 0, 6),
    ("eth_src", 6, 6),
    ("eth_type", 12, 2),
    ("vlan_tci", 14, 2),
    ("ipv4_ihl", 18, 1),
    ("ipv4_dscp", 19, 1),
    ("ipv4_tot_len", 20, 2),
    ("ipv4_ttl", 26, 1),
    ("ipv4_proto", 27, 1),
    ("ipv4_cksum", 28, 2),
    ("ipv4_src", 30, 4),
    ("ipv4_dst", 34, 4),
    ("tcp_sport", 38, 2),
    ("tcp_dport", 40, 2),
    ("udp_sport", 38, 2),
    ("udp_dport", 40, 2),
];

/// Look up a PHV field's (byte offset, byte width) by name.
pub fn phv_field(name: &str) -> Option<(u16, u16)> {
    PHV_FIELDS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|&(_, off, w)| (off, w))
}

/// Compose an action id from its opcode, field group and sub-op nibbles.
///
/// The control plane uses the same composition when installing table
/// entries, so the layout is part of the hardware contract.
pub fn make_action_id(op: AluOp, field_group: u8, sub_op: u8) -> u16 {
    (((op as u16) & 0xF) << 12) | (((field_group as u16) & 0xF) << 8) | (sub_op as u16 & 0xFF)
}
