use std::fs;
use std::process::ExitCode;

use clap::Parser;
use console::style;
use regex::Regex;

use seaopt::cli::Args;
use seaopt::error::ErrorReporter;
use seaopt::ir::optimizer::{CombinedConfig, CombinedOptimizer, LocalSimplify, Phase, run_pipeline};
use seaopt::ir::verify::verify;
use seaopt::reader::parse_module;
use seaopt::time::Timer;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn main() -> ExitCode {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let args = Args::parse();
    let mut timings: Vec<String> = Vec::new();

    let file_name = args.input.display().to_string();
    let source = match fs::read_to_string(&args.input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("{} {}: {}", style("ERROR").red().bold(), style(&file_name).red(), style(e).yellow());
            return ExitCode::FAILURE;
        }
    };
    let module_name = args.input.file_stem().and_then(|s| s.to_str()).unwrap_or("module").to_string();
    let reporter = ErrorReporter::new(&file_name, &source);

    let only = match args.only.as_deref().map(Regex::new).transpose() {
        Ok(re) => re,
        Err(e) => {
            eprintln!("{} invalid --only pattern: {}", style("ERROR").red().bold(), style(e).yellow());
            return ExitCode::FAILURE;
        }
    };

    let mut timer = Timer::new("parse");
    let mut module = match parse_module(&module_name, &source) {
        Ok(module) => module,
        Err(e) => {
            reporter.report(&e);
            return ExitCode::FAILURE;
        }
    };
    timings.push(timer.to_string());

    timer.restart("verify");
    for graph in &module.graphs {
        if let Err(e) = verify(graph) {
            reporter.report(&e);
            return ExitCode::FAILURE;
        }
    }
    timings.push(timer.to_string());

    if args.dump_initial {
        println!("{module}");
    }

    if !args.no_opt {
        let config = CombinedConfig {
            unknown_as_top: args.unknown_as_top,
            gcse: args.gcse,
            verbose: args.verbose,
            ..CombinedConfig::default()
        };
        let mut simplify = LocalSimplify::new(args.verbose);
        let mut combined = CombinedOptimizer::with_config(config);

        timer.restart("optimize");
        let changed = if let Some(re) = &only {
            let entities = module.entities.clone();
            let mut changed = false;
            for graph in module.graphs.iter_mut().filter(|g| re.is_match(&g.name)) {
                changed |= simplify.optimize_graph(graph, &entities);
                match combined.optimize_graph(graph, &entities) {
                    Ok(c) => changed |= c,
                    Err(e) => {
                        eprintln!("{} {}", style("ERROR").red().bold(), style(&e).yellow());
                        return ExitCode::FAILURE;
                    }
                }
            }
            changed
        } else {
            let mut phases: Vec<Box<dyn Phase>> = vec![Box::new(simplify), Box::new(combined)];
            match run_pipeline(&mut module, &mut phases) {
                Ok(changed) => {
                    if args.verbose {
                        for phase in &phases {
                            eprintln!("{} {}", style("ran").green(), phase.name());
                        }
                    }
                    changed
                }
                Err(e) => {
                    eprintln!("{} {}", style("ERROR").red().bold(), style(&e).yellow());
                    return ExitCode::FAILURE;
                }
            }
        };
        timings.push(timer.to_string());
        eprintln!(
            "{} {} ({} live nodes)",
            style("optimize:").cyan().bold(),
            if changed { "module modified" } else { "nothing to do" },
            module.count_live_nodes()
        );
    }

    println!("{module}");

    if args.timings {
        for line in &timings {
            eprintln!("{line}");
        }
    }

    ExitCode::SUCCESS
}
