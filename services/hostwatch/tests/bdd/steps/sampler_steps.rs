//! BDD step definitions for stats sampling feature

use std::collections::VecDeque;
use std::sync::Mutex;

use cucumber::{given, then, when};

use hostwatch::sampler::CycleOutcome;
use hostwatch::system::{CpuSnapshot, MemorySnapshot};
use hostwatch::HostwatchError;

use crate::world::{HostwatchWorld, ScriptedSource, STATS_WEBHOOK};

const MB: u64 = 1024 * 1024;

fn source(world: &mut HostwatchWorld) -> &mut ScriptedSource {
    world.source.get_or_insert_with(ScriptedSource::default)
}

fn counters(total: u64, user: u64) -> CpuSnapshot {
    let system = total / 20;
    CpuSnapshot {
        total,
        user,
        system,
        idle: total - user - system,
    }
}

#[given(expr = "a memory floor of {int} MB and a CPU ceiling of {int} percent")]
fn thresholds(world: &mut HostwatchWorld, floor: u32, ceiling: u32) {
    world.config.stats.app_name = "scraper".to_string();
    world.config.stats.memory_floor_mb = f64::from(floor);
    world.config.stats.cpu_ceiling_percent = f64::from(ceiling);
}

#[given("only reports over threshold are wanted")]
fn only_over_threshold(world: &mut HostwatchWorld) {
    world.config.stats.only_when_exceeded = true;
}

#[given(expr = "the host has {int} MB of unused memory")]
fn unused_memory(world: &mut HostwatchWorld, unused: u64) {
    let total = 8 * 1024 * MB;
    source(world).memory = MemorySnapshot {
        total,
        used: total - unused * MB,
        cached: 1024 * MB,
        free: unused * MB / 2,
    };
}

#[given(expr = "CPU counters advance from {int} total {int} user to {int} total {int} user")]
fn cpu_advances(world: &mut HostwatchWorld, t0: u64, u0: u64, t1: u64, u1: u64) {
    source(world).cpu = Mutex::new(VecDeque::from([counters(t0, u0), counters(t1, u1)]));
}

#[given(expr = "CPU counters stay at {int} total {int} user")]
fn cpu_stays(world: &mut HostwatchWorld, total: u64, user: u64) {
    source(world).cpu = Mutex::new(VecDeque::from([
        counters(total, user),
        counters(total, user),
    ]));
}

#[when("a sampling cycle runs")]
async fn run_cycle(world: &mut HostwatchWorld) {
    let sampler = world.build_sampler();
    world.cycle_result = Some(sampler.run_cycle().await);
}

#[then("the cycle delivers a stats report")]
fn cycle_delivers(world: &mut HostwatchWorld) {
    let result = world.cycle_result.as_ref().expect("no cycle ran");
    assert_eq!(result.as_ref().unwrap(), &CycleOutcome::Delivered);
}

#[then("the cycle is suppressed")]
fn cycle_suppressed(world: &mut HostwatchWorld) {
    let result = world.cycle_result.as_ref().expect("no cycle ran");
    assert_eq!(result.as_ref().unwrap(), &CycleOutcome::Suppressed);
}

#[then("the cycle fails with a sampling error")]
fn cycle_fails(world: &mut HostwatchWorld) {
    let result = world.cycle_result.as_ref().expect("no cycle ran");
    assert!(
        matches!(
            result.as_ref().err().and_then(|e| e.downcast_ref::<HostwatchError>()),
            Some(HostwatchError::Sampling(_))
        ),
        "{result:?}"
    );
}

#[then(expr = "the memory used line is {word}")]
async fn memory_line_state(world: &mut HostwatchWorld, state: String) {
    let sent = world.delivery().sent_to(STATS_WEBHOOK).await;
    let memory_used = &sent.last().expect("no stats delivered").attachments[1];
    assert!(memory_used.text.starts_with("Memory Used:"));
    assert_eq!(memory_used.highlighted, state == "highlighted");
}

#[then(expr = "the stats line {string} is reported")]
async fn stats_line(world: &mut HostwatchWorld, line: String) {
    let sent = world.delivery().sent_to(STATS_WEBHOOK).await;
    let payload = sent.last().expect("no stats delivered");
    assert!(
        payload.attachments.iter().any(|a| a.text == line),
        "{:?}",
        payload.attachments
    );
}

#[then(expr = "the stats report has {int} lines")]
async fn stats_line_count(world: &mut HostwatchWorld, count: usize) {
    let sent = world.delivery().sent_to(STATS_WEBHOOK).await;
    assert_eq!(sent.last().expect("no stats delivered").attachments.len(), count);
}
