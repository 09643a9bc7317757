//! Concurrency tests for the garden server
//!
//! Many gardeners against one server: zone exclusion, parallelism across
//! zones and stability of plot ownership.

use garden_client::network::GardenerClient;
use garden_client::observer::ObserverClient;
use garden_client::sweep::SweepOrder;
use garden_server::config::ServerConfig;
use garden_server::field::Plot;
use garden_server::garden::Garden;
use garden_server::server::Server;
use garden_shared::{BLOCKED, UNTOUCHED};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_test::assert_ok;

const TEST_TIMEOUT: Duration = Duration::from_secs(30);

async fn start(side: i32, seed: u64) -> (Server, String, Arc<Garden>) {
    let mut config = ServerConfig::new("127.0.0.1", 0, side);
    config.seed = Some(seed);
    let server = Server::bind(config).await.unwrap();
    let task_addr = server.task_addr().unwrap().to_string();
    let garden = server.garden();
    (server, task_addr, garden)
}

/// Expected hold time of one step on `plot` for a fresh field.
fn hold_for(garden: &Garden, plot: Plot, working_time: u64) -> Duration {
    if garden.field.read(plot) == UNTOUCHED {
        Duration::from_millis(working_time)
    } else {
        Duration::from_millis(working_time / 2)
    }
}

/// Splits observer output into map snapshots of `columns` cells per row.
fn parse_maps(text: &str, rows: usize, columns: usize) -> Vec<Vec<i32>> {
    let mut maps = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let is_row = tokens.len() == columns
            && tokens
                .iter()
                .all(|t| *t == "X" || t.parse::<i32>().is_ok());
        if !is_row {
            current.clear();
            continue;
        }
        current.extend(tokens.iter().map(|t| t.parse::<i32>().unwrap_or(BLOCKED)));
        if current.len() == rows * columns {
            maps.push(std::mem::take(&mut current));
        }
    }
    maps
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_gardeners_sweep_the_whole_field() {
    let (server, task_addr, garden) = start(3, 2024).await;
    let observer_addr = server.observer_addr().unwrap().to_string();
    let shutdown = server.shutdown_token();
    let running = tokio::spawn(server.run());

    let mut observer = assert_ok!(ObserverClient::connect(&observer_addr).await);
    while let Some(line) = assert_ok!(observer.next_line().await) {
        if line.starts_with("Observer connected from") {
            break;
        }
    }

    let initial = garden.field.snapshot();
    let gardeners = 6;
    let mut sweeps = JoinSet::new();
    for id in 1..=gardeners {
        let addr = task_addr.clone();
        let order = if id % 2 == 0 {
            SweepOrder::Columns
        } else {
            SweepOrder::Rows
        };
        sweeps.spawn(async move {
            let gardener = GardenerClient::connect(&addr, id, 2).await?;
            gardener.run_sweep(order).await
        });
    }

    while let Some(joined) = timeout(TEST_TIMEOUT, sweeps.join_next()).await.unwrap() {
        assert_eq!(assert_ok!(assert_ok!(joined)), 36);
    }

    shutdown.cancel();
    let report = timeout(TEST_TIMEOUT, running).await.unwrap().unwrap();
    assert_eq!(report.observers_notified, 1);

    let final_field = garden.field.snapshot();
    for (index, (&before, &after)) in initial.cells.iter().zip(&final_field.cells).enumerate() {
        if before == BLOCKED {
            assert_eq!(after, BLOCKED, "blocked plot {} changed", index);
        } else {
            assert!((1..=gardeners).contains(&after), "plot {} is {}", index, after);
        }
    }

    let mut out = Vec::new();
    assert_ok!(timeout(TEST_TIMEOUT, observer.run(&mut out)).await.unwrap());
    let text = String::from_utf8(out).unwrap();

    let maps = parse_maps(&text, 6, 6);
    assert_eq!(maps.len(), (gardeners as usize) * 36);

    // Maps are cumulative: claimed plots only ever grow
    let owned = |map: &Vec<i32>| map.iter().filter(|&&cell| cell > 0).count();
    for pair in maps.windows(2) {
        assert!(owned(&pair[1]) >= owned(&pair[0]));
        for (&before, &after) in pair[0].iter().zip(&pair[1]) {
            if before > 0 {
                assert_eq!(after, before);
            }
        }
    }
    assert_eq!(maps.last(), Some(&final_field.cells));

    let mut owners: HashMap<usize, HashSet<i32>> = HashMap::new();
    for map in &maps {
        for (index, &cell) in map.iter().enumerate() {
            if cell > 0 {
                owners.entry(index).or_default().insert(cell);
            }
            if initial.cells[index] == BLOCKED {
                assert_eq!(cell, BLOCKED);
            }
        }
    }
    for (index, seen) in owners {
        assert_eq!(seen.len(), 1, "plot {} changed owner: {:?}", index, seen);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_gardeners_leave_one_owner() {
    let (server, task_addr, garden) = start(2, 77).await;
    let shutdown = server.shutdown_token();
    let running = tokio::spawn(server.run());

    let snapshot = garden.field.snapshot();
    let index = snapshot
        .cells
        .iter()
        .position(|&cell| cell == UNTOUCHED)
        .unwrap();
    let plot = Plot::new(index / snapshot.columns, index % snapshot.columns);

    let mut racers = JoinSet::new();
    for id in 1..=8 {
        let addr = task_addr.clone();
        racers.spawn(async move {
            let mut gardener = GardenerClient::connect(&addr, id, 10).await?;
            gardener.work_plot(plot.row as i32, plot.col as i32).await?;
            gardener.finish().await
        });
    }
    while let Some(joined) = timeout(TEST_TIMEOUT, racers.join_next()).await.unwrap() {
        assert_ok!(assert_ok!(joined));
    }

    let owner = garden.field.read(plot);
    assert!((1..=8).contains(&owner));

    shutdown.cancel();
    timeout(TEST_TIMEOUT, running).await.unwrap().unwrap();
    assert_eq!(garden.field.read(plot), owner);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_zones_work_in_parallel() {
    let (server, task_addr, garden) = start(2, 5).await;
    let shutdown = server.shutdown_token();
    let running = tokio::spawn(server.run());

    let working_time = 200;
    let corners = [(0, 0), (0, 2), (2, 0), (2, 2)];
    let longest = corners
        .iter()
        .map(|&(row, col)| hold_for(&garden, Plot::new(row, col), working_time))
        .max()
        .unwrap();

    let started = Instant::now();
    let mut workers = JoinSet::new();
    for (id, &(row, col)) in (1..).zip(corners.iter()) {
        let addr = task_addr.clone();
        workers.spawn(async move {
            let mut gardener = GardenerClient::connect(&addr, id, working_time as i32).await?;
            gardener.work_plot(row as i32, col as i32).await?;
            gardener.finish().await
        });
    }
    while let Some(joined) = timeout(TEST_TIMEOUT, workers.join_next()).await.unwrap() {
        assert_ok!(assert_ok!(joined));
    }
    let elapsed = started.elapsed();

    assert!(elapsed >= longest);
    assert!(
        elapsed < longest * 3,
        "zones were serialized: {:?}",
        elapsed
    );

    shutdown.cancel();
    timeout(TEST_TIMEOUT, running).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_zone_is_worked_one_plot_at_a_time() {
    let (server, task_addr, garden) = start(2, 5).await;
    let shutdown = server.shutdown_token();
    let running = tokio::spawn(server.run());

    let working_time = 80;
    let zone = [(0, 0), (0, 1), (1, 0), (1, 1)];
    let total: Duration = zone
        .iter()
        .map(|&(row, col)| hold_for(&garden, Plot::new(row, col), working_time))
        .sum();

    let started = Instant::now();
    let mut workers = JoinSet::new();
    for (id, &(row, col)) in (1..).zip(zone.iter()) {
        let addr = task_addr.clone();
        workers.spawn(async move {
            let mut gardener = GardenerClient::connect(&addr, id, working_time as i32).await?;
            gardener.work_plot(row as i32, col as i32).await?;
            gardener.finish().await
        });
    }
    while let Some(joined) = timeout(TEST_TIMEOUT, workers.join_next()).await.unwrap() {
        assert_ok!(assert_ok!(joined));
    }

    assert!(started.elapsed() >= total);

    shutdown.cancel();
    timeout(TEST_TIMEOUT, running).await.unwrap().unwrap();
}
