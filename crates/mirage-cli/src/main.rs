//! Mirage compiler CLI
//!
//! Debugging surface for the IR core. There is no textual front end; the
//! subcommands operate on built-in demo pipelines constructed through the
//! same factories a real front end would use.

use clap::{Parser, Subcommand};
use mirage_error::{Error, Result};
use mirage_ir::{
    equal, scalarize, summarize_calls, Buffer, CompareCache, Expr, ForType, Function, Range, Stmt,
    Type,
};

#[derive(Parser)]
#[command(name = "mirage")]
#[command(version = "0.1.0")]
#[command(about = "Mirage image-pipeline compiler", long_about = None)]
struct Cli {
    /// Verbose logging (pass twice for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows a demo pipeline's loop nest (debug)
    Ir {
        /// Demo pipeline name (blur, histogram)
        #[arg(value_name = "PIPELINE", default_value = "blur")]
        pipeline: String,
    },

    /// Dumps a demo pipeline's call graph as JSON
    Calls {
        /// Demo pipeline name (blur, histogram)
        #[arg(value_name = "PIPELINE", default_value = "blur")]
        pipeline: String,

        /// Follow calls into callee definitions
        #[arg(long)]
        recurse: bool,
    },

    /// Scalarizes a demo pipeline's vectorized loop nest (debug)
    Scalarize {
        /// Demo pipeline name (blur, histogram)
        #[arg(value_name = "PIPELINE", default_value = "blur")]
        pipeline: String,
    },

    /// Runs the IR core's comparison self-checks
    Selftest,
}

/// A separable blur: blur_x reads the input image, blur_y reads blur_x.
/// Returns the output stage.
fn blur_pipeline() -> Function {
    let input = Buffer::new("input", Type::uint(16), 2);
    let x = Expr::var(Type::int(32), "x");
    let y = Expr::var(Type::int(32), "y");

    let blur_x = Function::new("blur_x");
    blur_x.define(
        vec!["x".into(), "y".into()],
        vec![
            (Expr::call_image(Type::uint(16), input.clone(), vec![x.clone() - Expr::int(1), y.clone()])
                + Expr::call_image(Type::uint(16), input.clone(), vec![x.clone(), y.clone()])
                + Expr::call_image(Type::uint(16), input, vec![x.clone() + Expr::int(1), y.clone()]))
                / Expr::cast(Type::uint(16), Expr::int(3)),
        ],
    );

    let call_blur_x = |dx: i32, dy: i32| {
        Expr::call_stage(
            Type::uint(16),
            blur_x.clone(),
            vec![x.clone() + Expr::int(dx), y.clone() + Expr::int(dy)],
            0,
        )
    };
    let blur_y = Function::new("blur_y");
    blur_y.define(
        vec!["x".into(), "y".into()],
        vec![
            (call_blur_x(0, -1) + call_blur_x(0, 0) + call_blur_x(0, 1))
                / Expr::cast(Type::uint(16), Expr::int(3)),
        ],
    );
    blur_y
}

/// A histogram: a pure zero-fill plus an update definition that reads the
/// counting stage itself.
fn histogram_pipeline() -> Function {
    use mirage_ir::{ReductionDomain, ReductionVariable};

    let bins = Function::new("bins");
    bins.define(vec!["i".into()], vec![Expr::int(0)]);

    let r = Expr::var(Type::int(32), "r");
    let domain = ReductionDomain::new(vec![ReductionVariable {
        var: "r".into(),
        min: Expr::int(0),
        extent: Expr::int(256),
    }]);
    bins.define_update(
        vec![r.clone()],
        vec![Expr::call_stage(Type::int(32), bins.clone(), vec![r], 0) + Expr::int(1)],
        domain,
    );
    bins
}

fn demo_pipeline(name: &str) -> Result<Function> {
    match name {
        "blur" => Ok(blur_pipeline()),
        "histogram" => Ok(histogram_pipeline()),
        other => Err(Error::UnknownPipeline(other.to_string())),
    }
}

/// A vectorized loop nest of the kind the lowering pass produces for the
/// named stage; the store writes a full vector per iteration.
fn demo_loop_nest(func: &Function) -> Stmt {
    let name = func.name();
    let x = Expr::var(Type::int(32), "x");
    let lanes: u16 = 4;

    let value = Expr::broadcast(Expr::cast(Type::uint(16), Expr::int(0)), lanes);
    let index = Expr::ramp(x.clone() * Expr::int(i32::from(lanes)), Expr::int(1), lanes);
    let store = Stmt::store(&name, value, index);
    let loop_x = Stmt::for_loop("x", Expr::int(0), Expr::int(16), ForType::Vectorized, store);
    let produce = Stmt::pipeline(&name, loop_x, Stmt::undefined(), Stmt::evaluate(Expr::int(0)));
    Stmt::realize(
        &name,
        vec![Type::uint(16)],
        vec![Range::new(Expr::int(0), Expr::int(64))],
        Expr::const_true(),
        produce,
    )
}

/// The comparison stress exercise: two independently-built copies of a
/// deeply shared tree must compare equal quickly, and adding one more level
/// to one side must flip the result.
fn run_selftest() -> Result<()> {
    let x = Expr::var(Type::int(32), "x");
    let mut e1 = x.clone();
    let mut e2 = x.clone();
    for _ in 0..100 {
        e1 = e1.clone() * e1.clone() + e1;
        e2 = e2.clone() * e2.clone() + e2;
    }
    let mut cache = CompareCache::new(10);
    if mirage_ir::compare_expr_cached(&e1, &e2, &mut cache) != std::cmp::Ordering::Equal {
        eprintln!("selftest: shared-tree comparison disagreed");
        std::process::exit(1);
    }
    e2 = e2.clone() * e2.clone() + e2;
    let down = mirage_ir::compare_expr_cached(&e1, &e2, &mut cache);
    let up = mirage_ir::compare_expr_cached(&e2, &e1, &mut cache);
    if down == std::cmp::Ordering::Equal || down.reverse() != up {
        eprintln!("selftest: mirror comparison disagreed");
        std::process::exit(1);
    }
    if !equal(&x, &Expr::var(Type::int(32), "x")) {
        eprintln!("selftest: variable equality disagreed");
        std::process::exit(1);
    }
    println!("ir equality selftest passed");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ir { pipeline } => {
            let func = demo_pipeline(&pipeline)?;
            println!("{}", demo_loop_nest(&func));
        }
        Commands::Calls { pipeline, recurse } => {
            let func = demo_pipeline(&pipeline)?;
            let summary = summarize_calls(&func, recurse);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Scalarize { pipeline } => {
            let func = demo_pipeline(&pipeline)?;
            let nest = demo_loop_nest(&func);
            println!("before:\n{}", nest);
            match scalarize(&nest) {
                Some(scalar) => println!("after:\n{}", scalar),
                None => {
                    eprintln!("scalarize does not apply to this loop nest");
                    std::process::exit(1);
                }
            }
        }
        Commands::Selftest => run_selftest()?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
