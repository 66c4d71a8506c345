//! Batch mode: generate several chains per length and run every solver
//! combination on them, writing one CSV of makespans per chain length.
//!
//! Each row holds, for every processor count `t` up to the chain length, the
//! columns `BnB_BnB/t/finished`, `BnB_BnB/t`, `BnB_List/t`, `DP/t` and
//! `DP_BnB/t`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::info;

use chainspan::config::Config;
use chainspan::dp;
use chainspan::gen::ChainGenerator;
use chainspan::pipeline;

#[derive(Parser)]
#[clap(name = "chainspan-batch")]
#[clap(about = "Batch makespan measurements over generated Jacobian chains")]
struct Args {
    /// Path to the key=value configuration file.
    config: PathBuf,
    /// Stem of the per-length CSV output files.
    #[clap(default_value = "results")]
    output: String,
}

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            process::exit(-1);
        }
    };

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(-1);
        }
    };

    let mut generator = ChainGenerator::from_config(&config);
    let budget = config.phase_budget();

    for length in generator.lengths() {
        let path = format!("{}{}.csv", args.output, length);
        let file = match File::create(&path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("failed to open {path}: {err}");
                process::exit(-1);
            }
        };
        let mut out = BufWriter::new(file);

        if let Err(err) = write_header(&mut out, length) {
            eprintln!("failed to write {path}: {err}");
            process::exit(-1);
        }

        for chain_idx in 0..generator.chains_per_length() {
            let chain = generator.generate(length);
            let dp_seq = dp::solve(&chain);
            info!(
                "chain {}/{} of length {length}: DP baseline {}",
                chain_idx + 1,
                generator.chains_per_length(),
                dp_seq.makespan()
            );

            let row = (1..=length)
                .map(|t| {
                    let cell = pipeline::run_batch_cell(&chain, &dp_seq, t, budget);
                    format!(
                        "{},{},{},{},{}",
                        cell.finished, cell.bnb_bnb, cell.bnb_list, cell.dp, cell.dp_bnb
                    )
                })
                .collect::<Vec<_>>()
                .join(",");

            if let Err(err) = writeln!(out, "{row}").and_then(|()| out.flush()) {
                eprintln!("failed to write {path}: {err}");
                process::exit(-1);
            }
        }
    }
}

fn write_header(out: &mut impl Write, length: usize) -> std::io::Result<()> {
    let header = (1..=length)
        .map(|t| format!("BnB_BnB/{t}/finished,BnB_BnB/{t},BnB_List/{t},DP/{t},DP_BnB/{t}"))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{header}")
}
