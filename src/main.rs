use std::io::Read;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use formula_sql::config::EngineConfig;
use formula_sql::formula::{
    format_formula, registry, verify, AdapterRegistry, ColumnSchema, CompileError, Compiler,
    Dialect, Diagnostic, Expr, FormulaAdapter, FormulaDataType, JsepJsonAdapter, Validator,
};
use tracing::{debug, Level};

/// Type-check spreadsheet formulas and compile them to SQL
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a formula to a SQL expression
    Compile(CompileArgs),
    /// Report type diagnostics for a formula
    Check(CheckArgs),
    /// Print a formula in canonical form
    Fmt {
        /// Formula text, or `-` to read stdin
        formula: String,
    },
    /// List the supported functions
    Functions {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct CompileArgs {
    /// Formula text, a jsep JSON tree, or `-` to read stdin
    formula: String,

    /// Target dialect (mysql, postgres, mssql, sqlite, oracle)
    #[arg(short, long)]
    dialect: Option<Dialect>,

    /// Output column alias
    #[arg(long)]
    alias: Option<String>,

    /// Table alias qualifying column references
    #[arg(long = "table")]
    table_alias: Option<String>,

    /// Column type used to check the formula first, e.g. `price=number`
    #[arg(long = "column", value_name = "NAME=TYPE")]
    columns: Vec<String>,

    /// Treat the input as a jsep JSON tree
    #[arg(long)]
    json_ast: bool,

    /// Compile as a filter predicate instead of a select-list value
    #[arg(long)]
    condition: bool,

    /// Fail on unknown functions instead of passing them through
    #[arg(long)]
    strict: bool,

    /// Render bindings inline instead of as `?` placeholders
    #[arg(long)]
    inline: bool,

    /// Parse the compiled SQL to check it
    #[arg(long)]
    verify: bool,

    /// Print a JSON object
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct CheckArgs {
    /// Formula text, a jsep JSON tree, or `-` to read stdin
    formula: String,

    /// Column type, e.g. `price=number`; any column makes unknown columns errors
    #[arg(long = "column", value_name = "NAME=TYPE")]
    columns: Vec<String>,

    /// Print diagnostics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Compile(args) => run_compile(args),
        Command::Check(args) => run_check(args),
        Command::Fmt { formula } => {
            let expr = AdapterRegistry::new().parse(&read_input(&formula)?)?;
            println!("{}", format_formula(&expr));
            Ok(ExitCode::SUCCESS)
        }
        Command::Functions { json } => {
            list_functions(json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_compile(args: CompileArgs) -> Result<ExitCode> {
    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("warning: ignoring config file: {e:#}");
        EngineConfig::default()
    });
    let text = read_input(&args.formula)?;
    let expr = parse_input(&text, args.json_ast)?;

    if !args.columns.is_empty() {
        let diagnostics = Validator::new()
            .with_schema(parse_columns(&args.columns)?)
            .validate(&expr);
        print_diagnostics(&diagnostics);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(ExitCode::FAILURE);
        }
    }

    let dialect = args.dialect.unwrap_or(config.default_dialect);
    let mut compiler = Compiler::with_options(dialect, config.compile_options());
    if let Some(alias) = args.alias {
        compiler = compiler.with_alias(alias);
    }
    if let Some(table_alias) = args.table_alias {
        compiler = compiler.with_table_alias(table_alias);
    }
    debug!(dialect = %dialect, condition = args.condition, "compiling formula");

    let output = if args.condition {
        compiler.compile_condition(&expr)
    } else {
        compiler.compile(&expr)
    };
    if (args.strict || config.strict) && !output.notices.is_empty() {
        return Err(CompileError::from(output.notices[0].clone()).into());
    }
    if args.verify || config.verify {
        verify(&output.fragment, dialect)?;
    }

    let sql = if args.inline {
        output.fragment.to_inline_sql(dialect)
    } else {
        output.fragment.text.clone()
    };
    if args.json {
        let bindings = if args.inline {
            Vec::new()
        } else {
            output.fragment.bindings.clone()
        };
        let value = serde_json::json!({
            "dialect": dialect,
            "sql": sql,
            "bindings": bindings,
            "notices": output.notices,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", sql);
        if !args.inline && !output.fragment.bindings.is_empty() {
            println!(
                "-- bindings: {}",
                serde_json::to_string(&output.fragment.bindings)?
            );
        }
        for notice in &output.notices {
            eprintln!("note: {:?}", notice);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_check(args: CheckArgs) -> Result<ExitCode> {
    let text = read_input(&args.formula)?;
    let mut validator = Validator::new();
    if !args.columns.is_empty() {
        validator = validator.with_schema(parse_columns(&args.columns)?);
    }

    let diagnostics = if JsepJsonAdapter.can_handle(&text) {
        validator.validate(&JsepJsonAdapter.parse(&text)?)
    } else {
        validator.check(&text)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else if diagnostics.is_empty() {
        println!("ok");
    } else {
        for diagnostic in &diagnostics {
            println!("{}", diagnostic);
        }
    }

    if diagnostics.iter().any(Diagnostic::is_error) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn list_functions(json: bool) -> Result<()> {
    let summaries: Vec<_> = registry::functions().map(|sig| sig.summary()).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    println!("{:<16} {:<8} RETURNS", "FUNCTION", "ARGS");
    for summary in summaries {
        println!("{:<16} {:<8} {}", summary.name, summary.arity, summary.returns);
    }
    Ok(())
}

fn read_input(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading formula from stdin")?;
    Ok(input.trim_end().to_string())
}

fn parse_input(text: &str, json_ast: bool) -> Result<Expr> {
    if json_ast {
        JsepJsonAdapter.parse(text)
    } else {
        AdapterRegistry::new().parse(text)
    }
}

fn parse_columns(specs: &[String]) -> Result<ColumnSchema> {
    let mut schema = ColumnSchema::new();
    for spec in specs {
        let Some((name, type_name)) = spec.split_once('=') else {
            bail!("invalid column '{}', expected NAME=TYPE", spec);
        };
        let data_type = FormulaDataType::from_name(type_name.trim())
            .ok_or_else(|| anyhow!("unknown column type '{}' for '{}'", type_name, name))?;
        schema.insert(name.trim(), data_type);
    }
    Ok(schema)
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic);
    }
}
