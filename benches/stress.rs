use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use chalet::engine::{Engine, EngineError};
use chalet::model::{Action, Color, ColorPeriod, Date, Principal};
use chalet::notify::NotifyHub;

fn wal_path(phase: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("chalet_bench_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).expect("create bench dir");
    dir.join(format!("{phase}.wal"))
}

fn day(offset: u64) -> Date {
    let base = NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid base date");
    base + Days::new(offset)
}

/// A fresh engine whose calendar is Blue for ten years from the base date.
async fn open(phase: &str) -> Arc<Engine> {
    let engine = Engine::new(wal_path(phase), Arc::new(NotifyHub::new())).expect("open engine");
    let periods = (0..10)
        .map(|y| {
            let start = NaiveDate::from_ymd_opt(2030 + y, 1, 1).expect("valid year");
            let end = NaiveDate::from_ymd_opt(2030 + y, 12, 31).expect("valid year");
            ColorPeriod::new(Color::Blue, start, end)
        })
        .collect();
    engine
        .replace_schedule(&Principal::approver("bench"), periods)
        .await
        .expect("seed calendar");
    Arc::new(engine)
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

async fn phase1_sequential() {
    let engine = open("sequential").await;
    let n = 1000u64;
    let mut latencies = Vec::with_capacity(n as usize);

    let start = Instant::now();
    for i in 0..n {
        let from = day(i * 2);
        let t = Instant::now();
        engine
            .create_reservation(&format!("u{i}"), from, from + Days::new(2))
            .await
            .expect("disjoint stay accepted");
        latencies.push(t.elapsed());
    }
    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} requests in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("request latency", &mut latencies);
}

async fn phase2_contended() {
    let engine = open("contended").await;
    let n_tasks = 32u64;
    let n_per_task = 50u64;

    // Every task aims at the same handful of weeks, so most requests conflict.
    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let (mut accepted, mut conflicts) = (0u64, 0u64);
            for j in 0..n_per_task {
                let from = day(((t + j) % 20) * 7);
                match engine
                    .create_reservation(&format!("u{t}"), from, from + Days::new(7))
                    .await
                {
                    Ok(_) => accepted += 1,
                    Err(EngineError::DateConflict(_)) => conflicts += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            (accepted, conflicts)
        }));
    }

    let (mut accepted, mut conflicts) = (0, 0);
    for h in handles {
        let (a, c) = h.await.expect("task");
        accepted += a;
        conflicts += c;
    }
    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    println!(
        "  {n_tasks} tasks x {n_per_task} requests = {total} in {:.2}s ({accepted} accepted, {conflicts} conflicts)",
        elapsed.as_secs_f64()
    );
    assert_eq!(accepted, 20, "each week admits exactly one stay");
}

async fn phase3_reads_under_load() {
    let engine = open("reads").await;
    let approver = Principal::approver("bench");
    for i in 0..200u64 {
        let from = day(i * 2);
        let r = engine
            .create_reservation("seed", from, from + Days::new(2))
            .await
            .expect("seed stay");
        engine
            .transition(r.id, &approver, Action::Approve)
            .await
            .expect("approve seed");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut writers = Vec::new();
    for w in 0..4u64 {
        let engine = engine.clone();
        let stop = stop.clone();
        writers.push(tokio::spawn(async move {
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let from = day(1000 + w * 10_000 / 4 + i * 2);
                let _ = engine
                    .create_reservation(&format!("w{w}"), from, from + Days::new(2))
                    .await;
                i += 1;
            }
        }));
    }

    let mut latencies = Vec::new();
    for _ in 0..500 {
        let t = Instant::now();
        let free = engine
            .compute_availability(day(0), day(365))
            .await
            .expect("availability");
        latencies.push(t.elapsed());
        std::hint::black_box(free);
    }
    stop.store(true, Ordering::Relaxed);
    for w in writers {
        let _ = w.await;
    }
    print_latency("availability latency (1y window)", &mut latencies);
}

fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    runtime.block_on(async {
        println!("=== chalet stress benchmark ===\n");

        println!("[phase 1] sequential request throughput");
        phase1_sequential().await;

        println!("\n[phase 2] contended overlapping requests");
        phase2_contended().await;

        println!("\n[phase 3] availability reads under write load");
        phase3_reads_under_load().await;

        println!("\n=== benchmark complete ===");
    });
}
