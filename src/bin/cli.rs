use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hostfuncs::backends::gemm::{NalgebraGemm, NdarrayGemm};
use hostfuncs::jacobian::jacobian;
use hostfuncs::linalg::{matmul, GemmDims, Threads};
use hostfuncs::logs::{LogConfig, LogSink};
use hostfuncs::optimize::{run_logged, OptimizeConfig, OPTIMIZE_LOG};
use hostfuncs::parallel::{build_pool, report_workers, scaled_product};
use hostfuncs::{config, HostError};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostfuncs")]
#[command(about = "Run the exported example routines from the command line")]
#[command(version)]
struct Args {
    /// Directory for log files (overrides HOSTFUNCS_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Maximum level written to log files
    #[arg(long, global = true, default_value_t = i64::MAX)]
    print_level: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parallel loop Y = X * (a + b) * Z over X = 1..=n
    Map {
        #[arg(short, long, default_value_t = 8)]
        n: usize,
        #[arg(short, long, default_value_t = 2.0)]
        a: f64,
        #[arg(short, long, default_value_t = 3.0)]
        b: f64,
        #[arg(short, long, default_value_t = 2)]
        threads: i32,
    },
    /// Constrained minimisation, written to example_NLopt.log
    Optimize {
        #[arg(long, default_value_t = 0.6)]
        m: f64,
        #[arg(long, default_value_t = 0.35)]
        alpha: f64,
        #[arg(long, default_value_t = 0.5)]
        beta: f64,
        #[arg(long, default_value_t = 10)]
        repeats: usize,
    },
    /// Value and Jacobian of y = [alpha*x0 + exp(x2), beta*x1]
    Jacobian {
        /// Evaluation point, at least three values
        #[arg(required = true, num_args = 3.., allow_negative_numbers = true)]
        x: Vec<f64>,
        #[arg(long, default_value_t = 1.0)]
        alpha: f64,
        #[arg(long, default_value_t = 1.0)]
        beta: f64,
    },
    /// Time batched square matrix products with both backends
    Matmul {
        #[arg(long, default_value_t = 100)]
        nrep: usize,
        #[arg(long, default_value_t = 64)]
        size: usize,
        #[arg(long, default_value_t = 4)]
        threads: i32,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), HostError> {
    let log_dir = args.log_dir.unwrap_or_else(config::log_dir);
    let log_config = LogConfig::default().with_threshold(args.print_level);

    match args.command {
        Command::Map { n, a, b, threads } => {
            let x: Vec<f64> = (1..=n).map(|i| i as f64).collect();
            let z = vec![1; n];
            let mut y = vec![0.0; n];

            let pool = build_pool(threads).map_err(hostfuncs::errors::ParallelError::from)?;
            scaled_product(&pool, &x, &z, a, b, &mut y)?;

            let sink = LogSink::with_config(log_dir.join("map.log"), log_config);
            sink.reset()?;
            report_workers(&pool, &sink, 0)?;

            println!("{} {:?}", "Y =".green().bold(), y);
            println!("worker report written to {}", sink.target().display());
        }
        Command::Optimize {
            m,
            alpha,
            beta,
            repeats,
        } => {
            let config = OptimizeConfig {
                m,
                alpha,
                beta,
                repeats,
                ..OptimizeConfig::default()
            };
            let sink = LogSink::with_config(log_dir.join(OPTIMIZE_LOG), log_config);
            let report = run_logged(&config, &sink)?;
            println!(
                "{} f({:.6}, {:.6}) = {:.10}",
                "minimum:".green().bold(),
                report.x[0],
                report.x[1],
                report.minf
            );
            println!(
                "time {:.4}s, inside {:.4}s, {} evaluations ({})",
                report.time.as_secs_f64(),
                report.inside.as_secs_f64(),
                report.evals,
                report.status
            );
        }
        Command::Jacobian { x, alpha, beta } => {
            let out = jacobian(&x, alpha, beta)?;
            println!("{} {:?}", "y =".green().bold(), out.y);
            println!("{}", "Jx =".green().bold());
            for row in out.jx.chunks(x.len()) {
                println!("  {:?}", row);
            }
        }
        Command::Matmul {
            nrep,
            size,
            threads,
        } => {
            let dims = GemmDims {
                nrep,
                m: size,
                n: size,
                k: size,
            };
            let len = nrep * size * size;
            let a: Vec<f64> = (0..len).map(|i| (i % 17) as f64 / 17.0).collect();
            let b: Vec<f64> = (0..len).map(|i| (i % 13) as f64 / 13.0).collect();
            let threads = Threads::new(1, threads);

            let mut c = vec![0.0; len];
            let secs = matmul::<NdarrayGemm>(dims, 1.0, 0.0, &a, &b, &mut c, threads)?;
            println!("{:>10} {:8.4}s", "ndarray".cyan(), secs);

            let mut c = vec![0.0; len];
            let secs = matmul::<NalgebraGemm>(dims, 1.0, 0.0, &a, &b, &mut c, threads)?;
            println!("{:>10} {:8.4}s", "nalgebra".cyan(), secs);
        }
    }
    Ok(())
}
