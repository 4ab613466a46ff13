use clap::{Parser, Subcommand};
use colored::Colorize;
use proofedit::binding::{Formula, FormulaError};
use proofedit::{match_template, parse, EditError, Expression, SymbolTables, TableError, TreePathBuf, VariableNaming};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "proofedit", about = "Parse, match and edit expressions against a table of definitions")]
struct Cli {
	/// JSON file with definitions.
	#[arg(long)]
	tables: PathBuf,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Parse an expression, print its serialized and human-readable forms.
	Parse {
		expression: String,
	},
	/// Match a template against an expression.
	Match {
		template: String,
		expression: String,
	},
	/// Replace the part of an expression at a path (`0.1.2`, empty for the root).
	Replace {
		expression: String,
		path: TreePathBuf,
		replacement: String,
	},
	/// Apply the rewrite rule `left <-> right` at a path.
	Rewrite {
		left: String,
		right: String,
		expression: String,
		path: TreePathBuf,
		/// Apply the rule from right to left.
		#[arg(long)]
		reverse: bool,
	},
}

#[derive(Debug, Error)]
enum CliError {
	#[error("can't read `{path}`: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error(transparent)]
	Tables(#[from] TableError),
	#[error(transparent)]
	Edit(#[from] EditError),
	#[error(transparent)]
	Formula(#[from] FormulaError),
	/// Ошибка уже напечатана в виде фрагмента исходника.
	#[error("parse error")]
	Reported,
}

fn parse_or_report(tables: &SymbolTables, input: &str) -> Result<Expression, CliError> {
	parse(tables, input).map_err(|error| {
		eprintln!("{}", error.render_snippet(input, true));
		CliError::Reported
	})
}

fn print_expression(label: &str, expression: &Expression) {
	println!("{} {}", label.green().bold(), expression);
	println!("{} {}", "nice:".green().bold(), expression.serialize_nicely(&[], &VariableNaming::default()));
}

fn print_paths(paths: &[TreePathBuf]) {
	for path in paths {
		println!("{} {}", "at:".cyan(), path);
	}
}

fn run(cli: Cli) -> Result<(), CliError> {
	let json = std::fs::read_to_string(&cli.tables).map_err(|source| CliError::Io {
		path: cli.tables.clone(),
		source,
	})?;
	let tables = SymbolTables::from_json(&json)?;

	match cli.command {
		Command::Parse { expression } => {
			let expression = parse_or_report(&tables, &expression)?;
			print_expression("parsed:", &expression);
		},
		Command::Match { template, expression } => {
			let template = parse_or_report(&tables, &template)?;
			let expression = parse_or_report(&tables, &expression)?;
			match match_template(&template, &expression) {
				Some(results) => {
					println!("{}", "matched".green().bold());
					for result in results {
						println!("  {}", result);
					}
				},
				None => println!("{}", "no match".yellow().bold()),
			}
		},
		Command::Replace { expression, path, replacement } => {
			let expression = parse_or_report(&tables, &expression)?;
			let replacement = parse_or_report(&tables, &replacement)?;
			let (result, paths) = expression.replace_at_path(&path, replacement)?;
			print_expression("replaced:", &result);
			print_paths(&paths);
		},
		Command::Rewrite { left, right, expression, path, reverse } => {
			let left = parse_or_report(&tables, &left)?;
			let right = parse_or_report(&tables, &right)?;
			let expression = parse_or_report(&tables, &expression)?;
			let formula = Formula::new(left, right)?;
			let formula = if reverse { formula.reversed()? } else { formula };
			match formula.apply_at(&expression, &path)? {
				Some((result, paths)) => {
					print_expression("rewritten:", &result);
					print_paths(&paths);
				},
				None => println!("{}", "no match".yellow().bold()),
			}
		},
	}

	Ok(())
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
		)
		.init();

	match run(Cli::parse()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(CliError::Reported) => ExitCode::FAILURE,
		Err(error) => {
			eprintln!("{} {}", "error:".red().bold(), error);
			ExitCode::FAILURE
		},
	}
}
