//! MEOW CLI Entry Point
//!
//! Loads a definition file and shows the workflow that emerges from it.
//!
//! # Usage
//!
//! ```bash
//! # Show the derived workflow
//! meow workflow.yaml
//!
//! # Check pattern integrity and recipe availability
//! meow workflow.yaml --check
//!
//! # Match against a specific vgrid
//! meow workflow.yaml --vgrid test
//!
//! # Dump the graph as JSON
//! meow workflow.yaml --json
//! ```

use std::env;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};

use meow::workflow::{load_definition, quick_validate, MeowError, WorkflowGraph};
use meow::{APP_NAME, VERSION};

/// Default definition file used when none is specified.
const DEFAULT_DEFINITION: &str = "workflow.yaml";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct Config {
    definition_path: String,
    vgrid: Option<String>,
    json: bool,
    check: bool,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            definition_path: DEFAULT_DEFINITION.to_string(),
            vgrid: None,
            json: false,
            check: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Managing Event-Oriented Workflows");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: meow [OPTIONS] <DEFINITION_FILE>");
    println!();
    println!("Arguments:");
    println!("  <DEFINITION_FILE>   Path to pattern/recipe YAML file (default: {})", DEFAULT_DEFINITION);
    println!();
    println!("Options:");
    println!("  --vgrid NAME        Vgrid to match against (overrides the file)");
    println!("  --check             Report pattern integrity and missing recipes");
    println!("  --json              Print the workflow graph as JSON");
    println!("  --verbose           Enable debug logging");
    println!("  --help              Show this help message");
    println!("  --version           Show version information");
    println!();
    println!("Examples:");
    println!("  meow workflow.yaml");
    println!("  meow workflow.yaml --vgrid test --json");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--json" => {
                config.json = true;
            }
            "--check" => {
                config.check = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--vgrid" => {
                i += 1;
                if i >= args.len() {
                    return Err("--vgrid requires a name argument".to_string());
                }
                config.vgrid = Some(args[i].clone());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.definition_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

fn print_graph(graph: &WorkflowGraph) {
    println!("{}", "Patterns:".cyan().bold());
    for (name, node) in graph.nodes() {
        println!("  {}", name.bold());

        for (parent, descriptor) in &node.ancestors {
            println!(
                "    {} {} ({} = {})",
                "<-".cyan(),
                parent,
                descriptor.output_file,
                descriptor.value
            );
        }
        for child in node.descendants.keys() {
            println!("    {} {}", "->".cyan(), child);
        }
        for (trigger_file, paths) in &node.workflow_inputs {
            println!("    {} {} {:?}", "input".dimmed(), trigger_file, paths);
        }
        for (output_name, path) in &node.workflow_outputs {
            println!("    {} {} = {}", "output".dimmed(), output_name, path);
        }
    }
    println!();

    println!("{} {}", "Entry points:".cyan(), graph.root_patterns().join(", "));
    println!("{} {}", "Exit points:".cyan(), graph.leaf_patterns().join(", "));

    match graph.topological_order() {
        Ok(order) => println!("{} {}", "Order:".cyan(), order.join(" -> ")),
        Err(MeowError::CyclicWorkflow(names)) => {
            println!("{} {}", "Cycle:".yellow(), names.join(", "))
        }
        Err(e) => warn!("{}", e),
    }
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(config.verbose);

    if !config.json {
        print_banner();
    }

    let mut definition = load_definition(&config.definition_path).map_err(|e| {
        error!("Failed to load definition: {}", e);
        format!(
            "Could not load definition from '{}': {}",
            config.definition_path, e
        )
    })?;

    if let Some(vgrid) = config.vgrid {
        definition.vgrid = Some(vgrid);
    }
    match definition.vgrid.as_deref() {
        Some(vgrid) => info!("Vgrid: {}", vgrid),
        None => info!("Vgrid unknown, matches are provisional"),
    }

    if config.check {
        let messages = quick_validate(&definition.patterns, &definition.recipes);
        let mut failed = false;
        for message in &messages {
            if message.is_error() {
                failed = true;
                println!("{} {}", "✗".red(), message);
            } else {
                println!("{} {}", "!".yellow(), message);
            }
        }

        if failed {
            return Err(format!("{} failed integrity checks", config.definition_path).into());
        }
        println!("{} Definition '{}' is valid", "✓".green(), config.definition_path);
        return Ok(());
    }

    let graph = definition.graph()?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&graph)?);
    } else {
        print_graph(&graph);
    }

    for name in graph.self_loops() {
        warn!("Pattern '{}' re-triggers itself", name);
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
