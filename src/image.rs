// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Binary initialization image generation.
//!
//! Every image is a fixed-size byte buffer in exactly the format the
//! hardware loads at reset. Depth not covered by written entries stays
//! zero-filled, which the hardware reads as invalid entries. Generators
//! never fail: entries that do not fit their backing memory are handled by
//! an explicit [`OverflowPolicy`] (logged, not diagnosed — the images stay
//! loadable either way).

use crate::hwspec::{
    MAU_ASRAM_DEPTH, MAU_ASRAM_WIDTH, MAU_TCAM_DEPTH, MAU_TCAM_KEY_W, PARSER_TCAM_DEPTH,
    PARSER_TCAM_WIDTH,
};
use crate::ir::{ActionDef, ActionPrimitive, ParserState};
use indexmap::IndexMap;

/// Parser TCAM entry size in bytes.
pub const PARSER_ENTRY_BYTES: usize = PARSER_TCAM_WIDTH / 8;

/// MAU TCAM entry size in bytes: a (key, mask) pair.
pub const MAU_TCAM_ENTRY_BYTES: usize = 2 * MAU_TCAM_KEY_W / 8;

/// Action SRAM entry size in bytes.
pub const ASRAM_ENTRY_BYTES: usize = MAU_ASRAM_WIDTH / 8;

/// Action parameter word size in bytes (the SRAM entry minus the 16-bit
/// action id).
pub const ACTION_PARAMS_BYTES: usize = ASRAM_ENTRY_BYTES - 2;

/// Number of fixed bootstrap entries at the front of the parser TCAM.
pub const BOOTSTRAP_ENTRIES: usize = 3;

// The packed parser entry must fit its hardware word; the canonical record
// below is the single source of truth for the layout.
const PARSER_ENTRY_PACKED_BYTES: usize = 8 + 8 + 1 + 1 + 1 + 2 + 1 + 1;
const _: () = assert!(PARSER_TCAM_WIDTH % 8 == 0);
const _: () = assert!(PARSER_ENTRY_PACKED_BYTES <= PARSER_ENTRY_BYTES);
const _: () = assert!(ACTION_PARAMS_BYTES == 14);

/// What to do with entries that do not fit their backing memory.
///
/// Initialization images are best-effort: the hardware boots from
/// whatever fits, and the control plane installs the remainder at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Keep everything that fits, drop the rest.
    Drop,
}

/// One parser TCAM entry in its canonical record form.
///
/// Wire layout, little-endian, padded with zeros to
/// [`PARSER_ENTRY_BYTES`]:
///
/// ```text
/// [0..8]   match key (u64)
/// [8..16]  match mask (u64)
/// [16]     next-state id
/// [17]     extract offset
/// [18]     extract length
/// [19]     PHV destination offset, high byte
/// [20]     PHV destination offset, low byte
/// [21]     header advance
/// [22]     valid flag
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserTcamEntry {
    pub key: u64,
    pub mask: u64,
    pub next_state: u8,
    pub extract_offset: u8,
    pub extract_len: u8,
    pub phv_dst_offset: u16,
    pub hdr_advance: u8,
    pub valid: bool,
}

impl ParserTcamEntry {
    /// Serialize into one hardware entry slot.
    pub fn encode_into(&self, entry: &mut [u8]) {
        entry[0..8].copy_from_slice(&self.key.to_le_bytes());
        entry[8..16].copy_from_slice(&self.mask.to_le_bytes());
        entry[16] = self.next_state;
        entry[17] = self.extract_offset;
        entry[18] = self.extract_len;
        entry[19] = (self.phv_dst_offset >> 8) as u8;
        entry[20] = (self.phv_dst_offset & 0xFF) as u8;
        entry[21] = self.hdr_advance;
        entry[22] = self.valid as u8;
    }

    /// Read back one entry slot.
    pub fn decode(entry: &[u8]) -> Self {
        let mut key = [0u8; 8];
        let mut mask = [0u8; 8];
        key.copy_from_slice(&entry[0..8]);
        mask.copy_from_slice(&entry[8..16]);
        Self {
            key: u64::from_le_bytes(key),
            mask: u64::from_le_bytes(mask),
            next_state: entry[16],
            extract_offset: entry[17],
            extract_len: entry[18],
            phv_dst_offset: ((entry[19] as u16) << 8) | entry[20] as u16,
            hdr_advance: entry[21],
            valid: entry[22] != 0,
        }
    }
}

impl From<&ParserState> for ParserTcamEntry {
    fn from(ps: &ParserState) -> Self {
        Self {
            key: ps.key_val,
            mask: ps.key_mask,
            next_state: ps.next_state as u8,
            extract_offset: ps.extract_offset as u8,
            extract_len: ps.extract_len as u8,
            phv_dst_offset: ps.phv_dst_offset,
            hdr_advance: ps.hdr_advance as u8,
            valid: true,
        }
    }
}

/// Fixed parser bootstrap, present in every image regardless of input:
/// START matches anything and hands off to the Ethernet state (1); the
/// Ethernet state matches EtherType 0x0800 and extracts the 14-byte
/// Ethernet header on its way to the IPv4 state (2); the IPv4 state
/// extracts the address words and accepts (0).
const BOOTSTRAP: [ParserTcamEntry; BOOTSTRAP_ENTRIES] = [
    ParserTcamEntry {
        key: 0,
        mask: 0,
        next_state: 1,
        extract_offset: 0,
        extract_len: 14,
        phv_dst_offset: 0,
        hdr_advance: 14,
        valid: true,
    },
    ParserTcamEntry {
        key: 0x0800,
        mask: 0xFFFF,
        next_state: 2,
        extract_offset: 14,
        extract_len: 20,
        phv_dst_offset: 14,
        hdr_advance: 20,
        valid: true,
    },
    ParserTcamEntry {
        key: 0,
        mask: 0,
        next_state: 0,
        extract_offset: 34,
        extract_len: 8,
        phv_dst_offset: 34,
        hdr_advance: 0,
        valid: true,
    },
];

/// Generate the parser TCAM image: the bootstrap entries, then user parser
/// states in registration order starting at entry [`BOOTSTRAP_ENTRIES`].
pub fn gen_parser_tcam(states: &[ParserState], policy: OverflowPolicy) -> Vec<u8> {
    let mut buf = vec![0u8; PARSER_TCAM_DEPTH * PARSER_ENTRY_BYTES];

    let capacity = PARSER_TCAM_DEPTH - BOOTSTRAP_ENTRIES;
    if states.len() > capacity {
        match policy {
            OverflowPolicy::Drop => clilog::warn!(
                "parser TCAM holds {} user entries, dropping {} of {}",
                capacity,
                states.len() - capacity,
                states.len()
            ),
        }
    }

    for (idx, entry) in BOOTSTRAP.iter().enumerate() {
        entry.encode_into(entry_slot(&mut buf, idx, PARSER_ENTRY_BYTES));
    }
    for (i, ps) in states.iter().take(capacity).enumerate() {
        let idx = BOOTSTRAP_ENTRIES + i;
        ParserTcamEntry::from(ps).encode_into(entry_slot(&mut buf, idx, PARSER_ENTRY_BYTES));
    }

    buf
}

/// Generate one stage's MAU TCAM image. The compiler only reserves the
/// memory layout: every entry is zero (invalid), and table match entries
/// are installed by the control plane at runtime.
pub fn gen_mau_tcam(_stage: usize) -> Vec<u8> {
    vec![0u8; MAU_TCAM_DEPTH * MAU_TCAM_ENTRY_BYTES]
}

/// Generate one stage's action SRAM image: for every registered action,
/// its 16-bit id followed by the encoded parameter word, at the slot its
/// id addresses. Colliding slots overwrite in registry order (best-effort,
/// like the rest of the initialization images).
pub fn gen_mau_asram(actions: &IndexMap<String, ActionDef>) -> Vec<u8> {
    let mut buf = vec![0u8; MAU_ASRAM_DEPTH * ASRAM_ENTRY_BYTES];

    for act in actions.values() {
        let slot = act.action_id as usize;
        if slot < MAU_ASRAM_DEPTH {
            let entry = entry_slot(&mut buf, slot, ASRAM_ENTRY_BYTES);
            entry[0..2].copy_from_slice(&act.action_id.to_le_bytes());
            entry[2..].copy_from_slice(&ActionParams::from_primitives(&act.primitives).encode());
        }
    }

    buf
}

/// Operand fields of one action parameter word.
///
/// The word encodes a single ALU micro-operation; an action with several
/// primitives keeps only its first in the SRAM (one micro-op per slot is a
/// hardware limitation of this entry format). Bit layout of the 112-bit
/// word, serialized least-significant-byte first:
///
/// ```text
/// [111:102] destination offset (10b)
/// [79:70]   source offset (10b)
/// [47:16]   immediate value (32b)
/// [15:8]    field width (8b)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionParams {
    pub dst_off: u16,
    pub src_off: u16,
    pub imm_val: u32,
    pub fwidth: u8,
}

impl ActionParams {
    /// Parameter word for an action's primitive list: the first primitive's
    /// operands, or all zeros for an empty list.
    pub fn from_primitives(primitives: &[ActionPrimitive]) -> Self {
        match primitives.first() {
            Some(p) => Self {
                dst_off: p.dst_off,
                src_off: p.src_off,
                imm_val: p.imm_val,
                fwidth: p.fwidth,
            },
            None => Self::default(),
        }
    }

    /// Pack into the wire format.
    pub fn encode(&self) -> [u8; ACTION_PARAMS_BYTES] {
        let mut word: u128 = 0;
        word |= ((self.dst_off as u128) & 0x3FF) << 102;
        word |= ((self.src_off as u128) & 0x3FF) << 70;
        word |= (self.imm_val as u128) << 16;
        word |= (self.fwidth as u128) << 8;
        let mut out = [0u8; ACTION_PARAMS_BYTES];
        out.copy_from_slice(&word.to_le_bytes()[..ACTION_PARAMS_BYTES]);
        out
    }

    /// Unpack from the wire format.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 16];
        raw[..ACTION_PARAMS_BYTES].copy_from_slice(&bytes[..ACTION_PARAMS_BYTES]);
        let word = u128::from_le_bytes(raw);
        Self {
            dst_off: ((word >> 102) & 0x3FF) as u16,
            src_off: ((word >> 70) & 0x3FF) as u16,
            imm_val: ((word >> 16) & 0xFFFF_FFFF) as u32,
            fwidth: ((word >> 8) & 0xFF) as u8,
        }
    }
}

fn entry_slot(buf: &mut [u8], idx: usize, entry_bytes: usize) -> &mut [u8] {
    &mut buf[idx * entry_bytes..(idx + 1) * entry_bytes]
}
