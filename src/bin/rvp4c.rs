// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! CLI for the RV-P4 data-plane compiler.

use std::path::{Path, PathBuf};

use rvp4c::compiler::Compiler;
use rvp4c::package::{self, ACTION_INFO_JSON, PHV_MAP_JSON, REPORT_FILE, TABLE_INFO_JSON};
use rvp4c::report;

#[derive(clap::Parser, Debug)]
#[command(
    name = "rvp4c",
    about = "RV-P4 data-plane compiler: annotated C to hardware configuration images"
)]
struct Cli {
    /// Input C source file carrying rvp4_* attribute annotations.
    input: PathBuf,

    /// Output .hwcfg archive path.
    #[clap(short, long, default_value = "dataplane.hwcfg")]
    output: PathBuf,

    /// Print the compilation report to stdout after success.
    #[clap(long)]
    report: bool,

    /// Also write the JSON metadata documents and the report as
    /// standalone files alongside the archive.
    #[clap(long)]
    dump_json: bool,
}

fn main() {
    clilog::init_stderr_color_debug();
    let cli = <Cli as clap::Parser>::parse();

    let src = std::fs::read_to_string(&cli.input).expect("Failed to read input source");
    let input_name = cli.input.display().to_string();

    let timer_compile = clilog::stimer!("compile");
    let mut cc = Compiler::new();
    cc.compile(&src);
    clilog::finish!(timer_compile);

    if cc.has_errors() {
        for e in &cc.errors {
            eprintln!("error: {}", e);
        }
        std::process::exit(1);
    }

    let timer_package = clilog::stimer!("package");
    let files = package::build_artifacts(&cc, &input_name).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(1);
    });
    package::write_archive(&files, &cli.output).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(1);
    });
    clilog::finish!(timer_package);

    if cli.report {
        println!("{}", report::gen_report(&cc, &input_name));
    }

    if cli.dump_json {
        let out_dir = match cli.output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        for name in [PHV_MAP_JSON, TABLE_INFO_JSON, ACTION_INFO_JSON, REPORT_FILE] {
            if let Some(data) = files.get(name) {
                std::fs::write(out_dir.join(name), data).expect("Failed to write metadata file");
            }
        }
    }

    let archive_bytes = std::fs::metadata(&cli.output).map(|m| m.len()).unwrap_or(0);
    println!(
        "Compiled {} → {} ({} bytes)",
        input_name,
        cli.output.display(),
        archive_bytes
    );
    for w in &cc.warnings {
        eprintln!("warning: {}", w);
    }
}
