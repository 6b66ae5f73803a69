//! Pipeline runner that outputs a markdown throughput table for the README.
//!
//! Run with: `cargo run --package candela-bench --bin throughput_table --release`

use candela_bench::{BenchmarkResult, Workload, format_duration, format_rate, run_pipeline};
use candela_lib::Interval;
use std::io::Write;

/// Number of iterations per row.
const ITERATIONS: usize = 3;

#[tokio::main]
async fn main() {
    println!("candela Pipeline Throughput");
    println!("===========================\n");
    println!("Running workloads ({ITERATIONS} iterations each)...\n");

    let rows: Vec<(&str, Vec<Interval>, Workload)> = vec![
        ("10k ticks, 1m", vec![Interval::Minute1], Workload::default()),
        (
            "10k ticks, 1s+1m",
            vec![Interval::Second1, Interval::Minute1],
            Workload::default(),
        ),
        (
            "50k ticks, all",
            Interval::all().to_vec(),
            Workload {
                ticks: 50_000,
                symbols: 32,
                span_secs: 3_600,
                ..Workload::default()
            },
        ),
    ];

    let mut results: Vec<(&str, Vec<BenchmarkResult>)> = Vec::new();
    for (name, intervals, workload) in &rows {
        print!("Benchmarking {name}... ");
        let _ = std::io::stdout().flush();

        let mut runs = Vec::new();
        for i in 0..ITERATIONS {
            let dir = match tempfile::TempDir::new() {
                Ok(dir) => dir,
                Err(e) => {
                    eprintln!("Error: could not create temp dir: {e}");
                    std::process::exit(1);
                }
            };
            let database = dir.path().join("candles.sqlite");
            match run_pipeline(workload.ticks(), intervals.clone(), 10, &database).await {
                Ok(result) => runs.push(result),
                Err(e) => eprintln!("\nRun {} failed: {e}", i + 1),
            }
            print!("R{} ", i + 1);
            let _ = std::io::stdout().flush();
        }

        results.push((name, runs));
        println!("done");
    }

    println!("\n## Results\n");
    println!("| Workload | Ingest | Ticks/s | Candles | Persist | Candles/s |");
    println!("|----------|--------|---------|---------|---------|-----------|");

    for (name, runs) in &results {
        let Some(avg) = average_results(runs) else {
            println!("| {name} | failed | - | - | - | - |");
            continue;
        };
        println!(
            "| {name} | {} | {} | {} | {} | {} |",
            format_duration(avg.ingest),
            format_rate(avg.ticks_per_sec()),
            avg.candles,
            format_duration(avg.persist),
            format_rate(avg.candles_per_sec()),
        );
    }
}

fn average_results(results: &[BenchmarkResult]) -> Option<BenchmarkResult> {
    let first = results.first()?;
    let n = results.len() as u32;
    Some(BenchmarkResult {
        ticks: first.ticks,
        candles: first.candles,
        ingest: results.iter().map(|r| r.ingest).sum::<std::time::Duration>() / n,
        persist: results.iter().map(|r| r.persist).sum::<std::time::Duration>() / n,
    })
}
