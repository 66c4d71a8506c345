//! Single-chain mode: generate one Jacobian chain from a config file, run
//! the full solver pipeline on it and report every phase - makespans,
//! per-operation schedules, search statistics and one DOT graph per solver.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use chainspan::config::Config;
use chainspan::dot;
use chainspan::gen::ChainGenerator;
use chainspan::pipeline;

#[derive(Parser)]
#[clap(name = "chainspan")]
#[clap(about = "Minimum-makespan schedules for Jacobian chain elimination")]
struct Args {
    /// Path to the key=value configuration file.
    config: PathBuf,
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

    println!("Configuration:");
    println!("{config}");

    let mut generator = ChainGenerator::from_config(&config);
    let length = *generator.lengths().start();
    let chain = generator.generate(length);

    let whole = chain.jacobian(chain.length() - 1, 0);
    println!("\nTangent cost: {}", whole.tangent_fma());
    println!("Adjoint cost: {}", whole.adjoint_fma());

    let report = pipeline::run_single(&chain, &config);

    for phase in &report.phases {
        println!(
            "\n{} solve duration: {} seconds",
            phase.label,
            phase.duration.as_secs_f64()
        );

        if let Some(stats) = &phase.stats {
            println!("{stats}");
        }

        if !phase.is_feasible() {
            println!("Optimized cost ({}): infeasible", phase.label);
            continue;
        }

        println!("Optimized cost ({}): {}\n", phase.label, phase.makespan);
        print!("{}", phase.sequence);

        if let Some(stem) = phase.dot_stem {
            if let Err(err) = dot::write(&phase.sequence, stem) {
                eprintln!("failed to write {stem}.dot: {err}");
            }
        }
    }
}
