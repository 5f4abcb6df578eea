// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Compilation driver: symbol classification, stage allocation, validation.
//!
//! One [`Compiler`] owns the table/action/parser-state registries for a
//! single compilation. The registries are populated while classifying the
//! extracted functions, mutated exactly once by the allocator, and then read
//! only by the image/metadata generators.

use crate::attr_parser::{extract_annotated_fns, AnnotatedFn};
use crate::hwspec::{MAU_TCAM_DEPTH, NUM_MAU_STAGES, USER_ACTION_ID_BASE};
use crate::ir::{builtin_actions, get_attr, ActionDef, Attribute, MatchKind, ParserState, TableDef};
use indexmap::IndexMap;

/// Role attribute marking a match table.
pub const ATTR_TABLE: &str = "rvp4_table";
/// Role attribute marking an action.
pub const ATTR_ACTION: &str = "rvp4_action";
/// Role attribute marking a parser state.
pub const ATTR_PARSER: &str = "rvp4_parser";

const ATTR_STAGE: &str = "rvp4_stage";
const ATTR_SIZE: &str = "rvp4_size";
const ATTR_LPM: &str = "rvp4_lpm";
const ATTR_EXACT: &str = "rvp4_exact";
const ATTR_TERNARY: &str = "rvp4_ternary";

/// Default table capacity when no `rvp4_size` is given.
const DEFAULT_TABLE_SIZE: u32 = 256;

/// Compiler instance for one source file.
pub struct Compiler {
    /// Match tables, keyed by name, in registration order.
    pub tables: IndexMap<String, TableDef>,
    /// Actions, keyed by name. Seeded with the builtin library.
    pub actions: IndexMap<String, ActionDef>,
    /// Parser transition rules, in registration order.
    pub parser_states: Vec<ParserState>,
    /// Recoverable findings; never block artifact generation.
    pub warnings: Vec<String>,
    /// Fatal findings; any entry blocks artifact generation.
    pub errors: Vec<String>,
    next_table_id: u32,
    next_action_id: u16,
    next_state_id: u16,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Create a compiler with empty registries and the builtin actions
    /// already seeded.
    pub fn new() -> Self {
        Self {
            tables: IndexMap::new(),
            actions: builtin_actions().clone(),
            parser_states: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            next_table_id: 0,
            next_action_id: USER_ACTION_ID_BASE,
            next_state_id: 1,
        }
    }

    /// Run the full front end over one source text: extract annotated
    /// functions, classify them into the registries, auto-assign stages,
    /// validate against the hardware capacities.
    ///
    /// Diagnostics accumulate in [`Compiler::warnings`] and
    /// [`Compiler::errors`]; check [`Compiler::has_errors`] before
    /// generating artifacts.
    pub fn compile(&mut self, src: &str) {
        let funcs = extract_annotated_fns(src);
        clilog::info!("extracted {} annotated functions", funcs.len());
        for f in &funcs {
            self.classify(f);
        }
        self.assign_stages();
        self.validate();
    }

    /// True if compilation produced at least one fatal error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Route one annotated function to its registry. The three role
    /// attributes are mutually exclusive; the first match in table /
    /// action / parser order wins, and a function with none is ignored.
    fn classify(&mut self, f: &AnnotatedFn) {
        if get_attr(&f.attrs, ATTR_TABLE).is_some() {
            self.register_table(&f.name, &f.attrs);
        } else if get_attr(&f.attrs, ATTR_ACTION).is_some() {
            self.register_action(&f.name);
        } else if get_attr(&f.attrs, ATTR_PARSER).is_some() {
            self.register_parser_state(&f.name);
        }
    }

    fn register_table(&mut self, name: &str, attrs: &[Attribute]) {
        let stage = attr_u32(attrs, ATTR_STAGE);
        let size = attr_u32(attrs, ATTR_SIZE).unwrap_or(DEFAULT_TABLE_SIZE);

        // Later markers win, so an (unusual) combination like
        // lpm + ternary resolves to ternary.
        let mut match_kind = MatchKind::Ternary;
        if get_attr(attrs, ATTR_LPM).is_some() {
            match_kind = MatchKind::Lpm;
        }
        if get_attr(attrs, ATTR_EXACT).is_some() {
            match_kind = MatchKind::Exact;
        }
        if get_attr(attrs, ATTR_TERNARY).is_some() {
            match_kind = MatchKind::Ternary;
        }

        let table_id = self.next_table_id;
        self.next_table_id += 1;

        self.tables.insert(
            name.to_string(),
            TableDef {
                name: name.to_string(),
                stage,
                table_id,
                match_kind,
                size,
                key_fields: Vec::new(),
                actions: Vec::new(),
            },
        );
    }

    fn register_action(&mut self, name: &str) {
        // A name collision with a builtin (or an earlier user action)
        // keeps the existing definition.
        if self.actions.contains_key(name) {
            return;
        }
        let action_id = self.next_action_id;
        self.next_action_id += 1;
        self.actions.insert(
            name.to_string(),
            ActionDef {
                name: name.to_string(),
                action_id,
                primitives: Vec::new(),
                params: Vec::new(),
            },
        );
    }

    fn register_parser_state(&mut self, name: &str) {
        let state_id = self.next_state_id;
        self.next_state_id += 1;
        // Placeholder rule: extract an Ethernet header and accept.
        self.parser_states.push(ParserState {
            name: name.to_string(),
            state_id,
            key_offset: 0,
            key_len: 2,
            key_val: 0,
            key_mask: 0,
            next_state: 0,
            extract_offset: 0,
            extract_len: 14,
            phv_dst_offset: 0,
            hdr_advance: 14,
        });
    }

    /// Give every table without an explicit stage the lowest stage number
    /// not yet claimed, walking the registry in registration order.
    ///
    /// Collisions between two *explicit* stage assignments are left alone.
    fn assign_stages(&mut self) {
        let mut used: std::collections::HashSet<u32> =
            self.tables.values().filter_map(|t| t.stage).collect();
        let mut next_free = 0u32;
        for t in self.tables.values_mut() {
            if t.stage.is_none() {
                while used.contains(&next_free) {
                    next_free += 1;
                }
                t.stage = Some(next_free);
                used.insert(next_free);
                next_free += 1;
            }
        }
    }

    /// Capacity checks. Stage overflow is fatal; an oversized table is
    /// clamped to the TCAM depth with a warning.
    fn validate(&mut self) {
        for t in self.tables.values_mut() {
            if let Some(stage) = t.stage {
                if stage >= NUM_MAU_STAGES as u32 {
                    self.errors.push(format!(
                        "Table '{}' assigned to stage {} (max {})",
                        t.name,
                        stage,
                        NUM_MAU_STAGES - 1
                    ));
                }
            }
            if t.size > MAU_TCAM_DEPTH as u32 {
                self.warnings.push(format!(
                    "Table '{}' size {} exceeds TCAM depth {}, truncating",
                    t.name, t.size, MAU_TCAM_DEPTH
                ));
                t.size = MAU_TCAM_DEPTH as u32;
            }
        }
    }
}

/// Read the first argument of the named attribute as a u32, if present and
/// well formed. An unparsable argument counts as absent.
fn attr_u32(attrs: &[Attribute], name: &str) -> Option<u32> {
    get_attr(attrs, name)
        .and_then(|a| a.args.first())
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwspec::AluOp;

    fn compile(src: &str) -> Compiler {
        let mut cc = Compiler::new();
        cc.compile(src);
        cc
    }

    fn table_src(name: &str, extra_attrs: &str) -> String {
        format!(
            "__attribute__((rvp4_table)) {} void {}(phv_t *phv, metadata_t *meta);\n",
            extra_attrs, name
        )
    }

    #[test]
    fn test_empty_source_keeps_builtins_only() {
        let cc = compile("");
        assert!(cc.tables.is_empty());
        assert!(cc.parser_states.is_empty());
        assert_eq!(cc.actions.len(), builtin_actions().len());
        assert!(!cc.has_errors());
        assert!(cc.warnings.is_empty());
    }

    #[test]
    fn test_table_defaults() {
        let cc = compile(&table_src("t0", ""));
        let t = &cc.tables["t0"];
        assert_eq!(t.table_id, 0);
        assert_eq!(t.size, 256);
        assert_eq!(t.match_kind, MatchKind::Ternary);
        // No explicit stage: the allocator hands out stage 0.
        assert_eq!(t.stage, Some(0));
    }

    #[test]
    fn test_match_kind_markers() {
        let cc = compile(&format!(
            "{}{}{}",
            table_src("t_lpm", "__attribute__((rvp4_lpm))"),
            table_src("t_exact", "__attribute__((rvp4_exact))"),
            table_src("t_tern", "__attribute__((rvp4_ternary))"),
        ));
        assert_eq!(cc.tables["t_lpm"].match_kind, MatchKind::Lpm);
        assert_eq!(cc.tables["t_exact"].match_kind, MatchKind::Exact);
        assert_eq!(cc.tables["t_tern"].match_kind, MatchKind::Ternary);
    }

    #[test]
    fn test_explicit_stages_never_altered() {
        let cc = compile(&format!(
            "{}{}",
            table_src("t_a", "__attribute__((rvp4_stage(5)))"),
            table_src("t_b", "__attribute__((rvp4_stage(9)))"),
        ));
        assert_eq!(cc.tables["t_a"].stage, Some(5));
        assert_eq!(cc.tables["t_b"].stage, Some(9));
        assert!(!cc.has_errors());
    }

    #[test]
    fn test_auto_assignment_fills_lowest_free_stages() {
        // t1 takes stage 1 explicitly; the other three get 0, 2, 3.
        let cc = compile(&format!(
            "{}{}{}{}",
            table_src("t0", ""),
            table_src("t1", "__attribute__((rvp4_stage(1)))"),
            table_src("t2", ""),
            table_src("t3", ""),
        ));
        assert_eq!(cc.tables["t0"].stage, Some(0));
        assert_eq!(cc.tables["t1"].stage, Some(1));
        assert_eq!(cc.tables["t2"].stage, Some(2));
        assert_eq!(cc.tables["t3"].stage, Some(3));
    }

    #[test]
    fn test_auto_assignment_dense_range() {
        let src: String = (0..8).map(|i| table_src(&format!("t{}", i), "")).collect();
        let cc = compile(&src);
        let stages: Vec<u32> = cc.tables.values().filter_map(|t| t.stage).collect();
        assert_eq!(stages, (0..8).collect::<Vec<u32>>());
    }

    #[test]
    fn test_oversized_table_clamped_with_one_warning() {
        let cc = compile(&table_src("t_big", "__attribute__((rvp4_size(100000)))"));
        assert_eq!(cc.tables["t_big"].size, MAU_TCAM_DEPTH as u32);
        assert_eq!(cc.warnings.len(), 1);
        assert!(cc.warnings[0].contains("t_big"));
        assert!(!cc.has_errors());
    }

    #[test]
    fn test_size_at_depth_not_warned() {
        let cc = compile(&table_src(
            "t_edge",
            &format!("__attribute__((rvp4_size({})))", MAU_TCAM_DEPTH),
        ));
        assert_eq!(cc.tables["t_edge"].size, MAU_TCAM_DEPTH as u32);
        assert!(cc.warnings.is_empty());
    }

    #[test]
    fn test_stage_out_of_range_is_fatal() {
        let cc = compile(&table_src("t_far", "__attribute__((rvp4_stage(24)))"));
        assert_eq!(cc.errors.len(), 1);
        assert!(cc.errors[0].contains("t_far"));
        assert!(cc.has_errors());
    }

    #[test]
    fn test_stage_overflow_by_count() {
        // 30 tables on 24 stages: the first 24 fit, 6 overflow.
        let src: String = (0..30).map(|i| table_src(&format!("t{}", i), "")).collect();
        let cc = compile(&src);
        for i in 0..24 {
            assert_eq!(cc.tables[&format!("t{}", i)].stage, Some(i as u32));
        }
        assert_eq!(cc.errors.len(), 6);
        assert!(cc.has_errors());
    }

    #[test]
    fn test_user_action_gets_fresh_id() {
        let cc = compile(
            "__attribute__((rvp4_action)) void act_mark(metadata_t *m);\n\
             __attribute__((rvp4_action)) void act_count(metadata_t *m);\n",
        );
        assert_eq!(cc.actions["act_mark"].action_id, USER_ACTION_ID_BASE);
        assert_eq!(cc.actions["act_count"].action_id, USER_ACTION_ID_BASE + 1);
        assert!(cc.actions["act_mark"].primitives.is_empty());
    }

    #[test]
    fn test_builtin_not_overridden_by_user_action() {
        let cc = compile("__attribute__((rvp4_action)) void drop(metadata_t *m);\n");
        let drop = &cc.actions["drop"];
        assert_eq!(drop.action_id, 0x1002);
        assert_eq!(drop.primitives[0].op, AluOp::Drop as u8);
        // No fresh id was spent on the collision.
        assert_eq!(cc.actions.len(), builtin_actions().len());
    }

    #[test]
    fn test_parser_state_placeholder_rule() {
        let cc = compile(
            "__attribute__((rvp4_parser)) void parse_ethernet(phv_t *p);\n\
             __attribute__((rvp4_parser)) void parse_ipv4(phv_t *p);\n",
        );
        assert_eq!(cc.parser_states.len(), 2);
        let s = &cc.parser_states[0];
        assert_eq!(s.state_id, 1);
        assert_eq!(s.extract_len, 14);
        assert_eq!(s.hdr_advance, 14);
        assert_eq!(s.next_state, 0);
        assert_eq!(cc.parser_states[1].state_id, 2);
    }

    #[test]
    fn test_unrecognized_role_ignored() {
        let cc = compile("__attribute__((rvp4_metadata)) void misc(int x);\n");
        assert!(cc.tables.is_empty());
        assert!(cc.parser_states.is_empty());
        assert_eq!(cc.actions.len(), builtin_actions().len());
    }
}
