// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Human-readable compilation report.

use crate::compiler::Compiler;
use crate::hwspec::{NUM_MAU_STAGES, PARSER_TCAM_DEPTH};
use crate::image::BOOTSTRAP_ENTRIES;
use std::collections::HashSet;

/// Render the compilation summary: registry counts, the stage-ordered
/// table allocation, the action listing, any findings, and resource
/// utilization against the hardware capacities.
pub fn gen_report(cc: &Compiler, src_file: &str) -> String {
    let mut lines = vec![
        "RV-P4 C-to-HW Compiler Report".to_string(),
        "=".repeat(40),
        format!("Source: {}", src_file),
        format!("Tables: {}", cc.tables.len()),
        format!("Actions: {}", cc.actions.len()),
        format!(
            "Parser states: {}",
            cc.parser_states.len() + BOOTSTRAP_ENTRIES
        ),
        String::new(),
        "Table Allocation:".to_string(),
    ];

    let mut tables: Vec<_> = cc.tables.values().collect();
    tables.sort_by_key(|t| t.stage);
    for t in tables {
        lines.push(format!(
            "  [{:2}] {:<30} {:<8} size={}",
            t.stage.unwrap_or(0),
            t.name,
            t.match_kind,
            t.size
        ));
    }

    lines.push(String::new());
    lines.push("Actions:".to_string());
    for a in cc.actions.values() {
        lines.push(format!("  0x{:04X}  {}", a.action_id, a.name));
    }

    if !cc.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        lines.extend(cc.warnings.iter().map(|w| format!("  W: {}", w)));
    }
    if !cc.errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        lines.extend(cc.errors.iter().map(|e| format!("  E: {}", e)));
    }

    let stages_used: HashSet<u32> = cc.tables.values().filter_map(|t| t.stage).collect();
    lines.push(String::new());
    lines.push("Resource Usage:".to_string());
    lines.push(format!(
        "  MAU stages used: {}/{}",
        stages_used.len(),
        NUM_MAU_STAGES
    ));
    lines.push(format!(
        "  Parser TCAM entries: {}/{}",
        cc.parser_states.len() + BOOTSTRAP_ENTRIES,
        PARSER_TCAM_DEPTH
    ));

    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builtin_actions;

    #[test]
    fn test_report_empty_source() {
        let mut cc = Compiler::new();
        cc.compile("");
        let report = gen_report(&cc, "empty.c");
        assert!(report.contains("Source: empty.c"));
        assert!(report.contains("Tables: 0"));
        assert!(report.contains(&format!("Actions: {}", builtin_actions().len())));
        assert!(report.contains("Parser states: 3"));
        assert!(report.contains("MAU stages used: 0/24"));
        assert!(report.contains("Parser TCAM entries: 3/256"));
        assert!(!report.contains("Warnings:"));
        assert!(!report.contains("Errors:"));
    }

    #[test]
    fn test_report_tables_listed_in_stage_order() {
        let mut cc = Compiler::new();
        cc.compile(
            "__attribute__((rvp4_table)) __attribute__((rvp4_stage(7))) void t_late(void);\n\
             __attribute__((rvp4_table)) __attribute__((rvp4_exact)) void t_early(void);\n",
        );
        let report = gen_report(&cc, "two.c");
        let late = report.find("t_late").unwrap();
        let early = report.find("t_early").unwrap();
        assert!(early < late, "stage 0 table must be listed first");
        assert!(report.contains("[ 0] t_early"));
        assert!(report.contains("[ 7] t_late"));
        assert!(report.contains("MAU stages used: 2/24"));
    }

    #[test]
    fn test_report_carries_findings() {
        let mut cc = Compiler::new();
        cc.compile(
            "__attribute__((rvp4_table)) __attribute__((rvp4_size(100000))) void t_big(void);\n\
             __attribute__((rvp4_table)) __attribute__((rvp4_stage(99))) void t_far(void);\n",
        );
        let report = gen_report(&cc, "bad.c");
        assert!(report.contains("Warnings:"));
        assert!(report.contains("  W: Table 't_big'"));
        assert!(report.contains("Errors:"));
        assert!(report.contains("  E: Table 't_far'"));
    }
}
