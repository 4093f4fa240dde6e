//! SMOKE command - health and list checks with a latency summary.
//!
//! Each iteration requests `/healthz` and `/v1/notes` and expects 200 from
//! both. The run fails when the p95 latency or the failure rate crosses its
//! threshold.

use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use super::{HumanReadable, output};

const CHECKS: [(&str, &str); 2] = [("health 200", "/healthz"), ("notes 200", "/v1/notes")];

#[derive(Args)]
pub struct SmokeArgs {
    /// Iterations per worker
    #[arg(long, short = 'n', default_value_t = 10)]
    pub iterations: u32,

    /// Concurrent workers
    #[arg(long, short = 'w', default_value_t = 1)]
    pub workers: u32,

    /// Pause between iterations in milliseconds
    #[arg(long, default_value_t = 200)]
    pub pause_ms: u64,

    /// Fail when p95 latency exceeds this many milliseconds
    #[arg(long, default_value_t = 500.0)]
    pub p95_ms: f64,

    /// Fail when the failure rate exceeds this fraction
    #[arg(long, default_value_t = 0.01)]
    pub max_failure_rate: f64,
}

/// Outcome of one request.
#[derive(Debug, Clone)]
struct Sample {
    check: &'static str,
    ok: bool,
    elapsed: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckSummary {
    pub name: String,
    pub passed: u32,
    pub failed: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SmokeReport {
    pub requests: u32,
    pub failures: u32,
    pub failure_rate: f64,
    pub checks: Vec<CheckSummary>,
    pub latency: LatencySummary,
    pub passed: bool,
}

impl HumanReadable for SmokeReport {
    fn print_human(&self) {
        println!("{}", "Smoke check".green().bold());
        println!("{}", "=".repeat(40));
        println!();

        for check in &self.checks {
            let mark = if check.failed == 0 { "✓".green() } else { "✗".red() };
            println!(
                "  {} {:<12} {} passed, {} failed",
                mark, check.name, check.passed, check.failed
            );
        }

        println!();
        println!(
            "  {} min {:.1} ms, p50 {:.1} ms, p95 {:.1} ms, max {:.1} ms",
            "Latency:".cyan(),
            self.latency.min_ms,
            self.latency.p50_ms,
            self.latency.p95_ms,
            self.latency.max_ms
        );
        println!(
            "  {} {}/{} ({:.2}%)",
            "Failures:".cyan(),
            self.failures,
            self.requests,
            self.failure_rate * 100.0
        );
        println!();

        if self.passed {
            println!("{}", "PASSED".green().bold());
        } else {
            println!("{}", "FAILED".red().bold());
        }
    }
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn summarize(samples: &[Sample], args: &SmokeArgs) -> SmokeReport {
    let checks = CHECKS
        .iter()
        .map(|(name, _)| {
            let (passed, failed) = samples
                .iter()
                .filter(|s| s.check == *name)
                .fold((0, 0), |(p, f), s| if s.ok { (p + 1, f) } else { (p, f + 1) });
            CheckSummary {
                name: (*name).to_string(),
                passed,
                failed,
            }
        })
        .collect();

    let mut latencies: Vec<f64> = samples
        .iter()
        .map(|s| s.elapsed.as_secs_f64() * 1000.0)
        .collect();
    latencies.sort_by(f64::total_cmp);

    let requests = samples.len() as u32;
    let failures = samples.iter().filter(|s| !s.ok).count() as u32;
    let failure_rate = if requests == 0 {
        0.0
    } else {
        f64::from(failures) / f64::from(requests)
    };
    let latency = LatencySummary {
        min_ms: latencies.first().copied().unwrap_or(0.0),
        p50_ms: percentile(&latencies, 50.0),
        p95_ms: percentile(&latencies, 95.0),
        max_ms: latencies.last().copied().unwrap_or(0.0),
    };
    let passed = requests > 0 && latency.p95_ms < args.p95_ms && failure_rate < args.max_failure_rate;

    SmokeReport {
        requests,
        failures,
        failure_rate,
        checks,
        latency,
        passed,
    }
}

async fn run_worker(
    client: reqwest::Client,
    base_url: String,
    iterations: u32,
    pause: Duration,
) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(iterations as usize * CHECKS.len());

    for i in 0..iterations {
        for (check, path) in CHECKS {
            let start = Instant::now();
            let ok = match client.get(format!("{}{}", base_url, path)).send().await {
                Ok(response) => response.status() == reqwest::StatusCode::OK,
                Err(_) => false,
            };
            samples.push(Sample {
                check,
                ok,
                elapsed: start.elapsed(),
            });
        }
        if i + 1 < iterations {
            tokio::time::sleep(pause).await;
        }
    }

    samples
}

/// Execute the smoke command.
pub async fn execute(
    client: &reqwest::Client,
    base_url: &str,
    human: bool,
    args: SmokeArgs,
) -> Result<()> {
    if args.iterations == 0 || args.workers == 0 {
        bail!("iterations and workers must be at least 1");
    }

    let pause = Duration::from_millis(args.pause_ms);
    let mut workers = JoinSet::new();
    for _ in 0..args.workers {
        workers.spawn(run_worker(
            client.clone(),
            base_url.to_string(),
            args.iterations,
            pause,
        ));
    }

    let mut samples = Vec::new();
    while let Some(result) = workers.join_next().await {
        samples.extend(result?);
    }

    let report = summarize(&samples, &args);
    output(&report, human)?;

    if !report.passed {
        bail!(
            "smoke check failed: p95 {:.1} ms (limit {} ms), failure rate {:.4} (limit {})",
            report.latency.p95_ms,
            args.p95_ms,
            report.failure_rate,
            args.max_failure_rate
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SmokeArgs {
        SmokeArgs {
            iterations: 1,
            workers: 1,
            pause_ms: 0,
            p95_ms: 500.0,
            max_failure_rate: 0.01,
        }
    }

    fn sample(check: &'static str, ok: bool, ms: u64) -> Sample {
        Sample {
            check,
            ok,
            elapsed: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(percentile(&values, 50.0), 10.0);
        assert_eq!(percentile(&values, 95.0), 19.0);
        assert_eq!(percentile(&values, 100.0), 20.0);
        assert_eq!(percentile(&[], 95.0), 0.0);
    }

    #[test]
    fn test_summary_passes_fast_clean_run() {
        let samples = vec![
            sample("health 200", true, 5),
            sample("notes 200", true, 12),
        ];
        let report = summarize(&samples, &args());
        assert!(report.passed);
        assert_eq!(report.requests, 2);
        assert_eq!(report.latency.max_ms, 12.0);
    }

    #[test]
    fn test_summary_fails_on_errors_or_latency() {
        let failing = vec![
            sample("health 200", true, 5),
            sample("notes 200", false, 5),
        ];
        let report = summarize(&failing, &args());
        assert!(!report.passed);
        assert_eq!(report.checks[1].failed, 1);

        let slow = vec![sample("health 200", true, 900)];
        assert!(!summarize(&slow, &args()).passed);
    }
}
