//! Supervision policies, escalation, health checks, and repeaters.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{expect_event, recorder, Log};
use parking_lot::Mutex;
use troupe::{
    msg, producer, Context, Engine, EngineConfig, Event, Opts, Pid, Receiver, SendRepeater,
    Started, SupervisionPolicy,
};

fn engine() -> Engine {
    common::init_tracing();
    Engine::new(EngineConfig::new())
}

type PidSlot = Arc<Mutex<Option<Pid>>>;

/// Parent that spawns a volatile child on demand and reports its children.
struct Parent {
    log: Log,
    child_policy: SupervisionPolicy,
    child_pid: PidSlot,
    grandchild_pid: PidSlot,
}

#[async_trait]
impl Receiver for Parent {
    async fn receive(&mut self, ctx: &mut Context) {
        if let Some(text) = ctx.message().downcast_ref::<String>() {
            match text.as_str() {
                "spawn" => {
                    let bomb = {
                        let grandchild_pid = Arc::clone(&self.grandchild_pid);
                        producer(move || Bomb {
                            grandchild_pid: Arc::clone(&grandchild_pid),
                        })
                    };
                    let pid = ctx
                        .spawn_child(
                            bomb,
                            "child",
                            Opts::new().supervision_policy(self.child_policy),
                        )
                        .unwrap();
                    *self.child_pid.lock() = Some(pid);
                }
                "report" => self.log.push(format!("children:{}", ctx.children().len())),
                _ => {}
            }
        }
    }
}

/// Child that spawns a grandchild when started and panics on `die`.
struct Bomb {
    grandchild_pid: PidSlot,
}

#[async_trait]
impl Receiver for Bomb {
    async fn receive(&mut self, ctx: &mut Context) {
        if ctx.message().downcast_ref::<Started>().is_some() {
            let pid = ctx
                .spawn_child_func(|_ctx| {}, "grandchild", Opts::new())
                .unwrap();
            *self.grandchild_pid.lock() = Some(pid);
        } else if let Some(text) = ctx.message().downcast_ref::<String>() {
            if text == "die" {
                panic!("child blew up");
            }
        }
    }
}

#[tokio::test]
async fn test_escalate_failure_tears_down_subtree_and_fails_parent() {
    let engine = engine();
    let mut events = engine.subscribe();
    let log = Log::default();
    let child_pid: PidSlot = Arc::default();
    let grandchild_pid: PidSlot = Arc::default();

    let parent = {
        let (log, child_pid, grandchild_pid) = (
            log.clone(),
            Arc::clone(&child_pid),
            Arc::clone(&grandchild_pid),
        );
        producer(move || Parent {
            log: log.clone(),
            child_policy: SupervisionPolicy::EscalateFailure,
            child_pid: Arc::clone(&child_pid),
            grandchild_pid: Arc::clone(&grandchild_pid),
        })
    };
    let parent_pid = engine
        .spawn(
            parent,
            "parent",
            Opts::new().restart_delay(Duration::from_millis(1)),
        )
        .unwrap();

    engine.send(&parent_pid, msg("spawn".to_string()));
    let (child, grandchild) = wait_for_pids(&child_pid, &grandchild_pid).await;

    engine.send(&child, msg("die".to_string()));

    // Depth-first teardown: the grandchild stops before the child.
    let stopped = expect_event(&mut events, Duration::from_secs(2), |e| {
        matches!(e, Event::ActorStopped { .. })
    })
    .await;
    assert_eq!(stopped.pid().unwrap(), &grandchild);
    let stopped = expect_event(&mut events, Duration::from_secs(2), |e| {
        matches!(e, Event::ActorStopped { .. })
    })
    .await;
    assert_eq!(stopped.pid().unwrap(), &child);

    // The escalation runs the parent's own failure path.
    let restarted = expect_event(&mut events, Duration::from_secs(2), |e| {
        matches!(e, Event::ActorRestarted { .. })
    })
    .await;
    assert_eq!(restarted.pid().unwrap(), &parent_pid);

    // Parent survived, subtree is gone and unlinked.
    assert!(engine.processed_count(&parent_pid).is_some());
    assert!(engine.processed_count(&child).is_none());
    assert!(engine.processed_count(&grandchild).is_none());

    engine.send(&parent_pid, msg("report".to_string()));
    log.wait_for("children:0", Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_stop_child_policy_stops_without_restart() {
    let engine = engine();
    let mut events = engine.subscribe();
    let log = Log::default();
    let child_pid: PidSlot = Arc::default();
    let grandchild_pid: PidSlot = Arc::default();

    let parent = {
        let (log, child_pid, grandchild_pid) = (
            log.clone(),
            Arc::clone(&child_pid),
            Arc::clone(&grandchild_pid),
        );
        producer(move || Parent {
            log: log.clone(),
            child_policy: SupervisionPolicy::StopChild,
            child_pid: Arc::clone(&child_pid),
            grandchild_pid: Arc::clone(&grandchild_pid),
        })
    };
    let parent_pid = engine.spawn(parent, "parent", Opts::new()).unwrap();

    engine.send(&parent_pid, msg("spawn".to_string()));
    let (child, _grandchild) = wait_for_pids(&child_pid, &grandchild_pid).await;

    engine.send(&child, msg("die".to_string()));

    expect_event(&mut events, Duration::from_secs(2), |e| {
        matches!(e, Event::ActorStopped { .. }) && e.pid() == Some(&child)
    })
    .await;

    // No restart anywhere: the child stopped, the parent never failed.
    tokio::time::sleep(Duration::from_millis(30)).await;
    while let Ok(event) = events.events.try_recv() {
        assert!(!matches!(event, Event::ActorRestarted { .. }));
    }
    assert!(engine.processed_count(&parent_pid).is_some());
    assert!(engine.processed_count(&child).is_none());
}

#[tokio::test]
async fn test_sibling_unaffected_by_panic() {
    let engine = engine();
    let log = Log::default();

    let bomb = producer(move || Bomb {
        grandchild_pid: Arc::default(),
    });
    let volatile = engine
        .spawn(
            bomb,
            "volatile",
            Opts::new().restart_delay(Duration::from_millis(1)),
        )
        .unwrap();
    let steady = engine
        .spawn(recorder(log.clone()), "steady", Opts::new())
        .unwrap();

    engine.send(&volatile, msg("die".to_string()));
    engine.send(&steady, msg("still here".to_string()));

    log.wait_for("still here", Duration::from_secs(2)).await;
}

/// Enables a health probe on start and counts probe invocations.
struct Probed {
    healthy: bool,
    probes: Arc<AtomicU32>,
}

#[async_trait]
impl Receiver for Probed {
    async fn receive(&mut self, ctx: &mut Context) {
        if ctx.message().downcast_ref::<Started>().is_some() {
            let healthy = self.healthy;
            let probes = Arc::clone(&self.probes);
            ctx.enable_health_check(Duration::from_millis(10), move || {
                probes.fetch_add(1, Ordering::SeqCst);
                healthy
            });
        } else if let Some(text) = ctx.message().downcast_ref::<String>() {
            if text == "off" {
                ctx.disable_health_check();
            }
        }
    }
}

#[tokio::test]
async fn test_failing_health_check_broadcasts_and_applies_policy() {
    let engine = engine();
    let mut events = engine.subscribe();
    let probes = Arc::new(AtomicU32::new(0));

    let probed = {
        let probes = Arc::clone(&probes);
        producer(move || Probed {
            healthy: false,
            probes: Arc::clone(&probes),
        })
    };
    let pid = engine
        .spawn(
            probed,
            "probed",
            Opts::new().restart_delay(Duration::from_millis(1)),
        )
        .unwrap();

    // Within 50 ms of a 10 ms probe interval the event must be out.
    let unhealthy = expect_event(&mut events, Duration::from_millis(50), |e| {
        matches!(e, Event::ActorUnhealthy { .. })
    })
    .await;
    assert_eq!(unhealthy.pid().unwrap(), &pid);

    // Default policy restarts the actor.
    let restarted = expect_event(&mut events, Duration::from_secs(2), |e| {
        matches!(e, Event::ActorRestarted { .. })
    })
    .await;
    assert_eq!(restarted.pid().unwrap(), &pid);

    engine.poison(&pid).wait().await;
}

#[tokio::test]
async fn test_disable_health_check_stops_probing() {
    let engine = engine();
    let probes = Arc::new(AtomicU32::new(0));

    let probed = {
        let probes = Arc::clone(&probes);
        producer(move || Probed {
            healthy: true,
            probes: Arc::clone(&probes),
        })
    };
    let pid = engine.spawn(probed, "probed", Opts::new()).unwrap();

    // Healthy probes tick without raising events.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while probes.load(Ordering::SeqCst) < 2 {
        assert!(tokio::time::Instant::now() < deadline, "probe never ran");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    engine.send(&pid, msg("off".to_string()));
    tokio::time::sleep(Duration::from_millis(30)).await;
    let frozen = probes.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    // One in-flight tick of slack, nothing more.
    assert!(probes.load(Ordering::SeqCst) <= frozen + 1);

    engine.poison(&pid).wait().await;
}

/// Sends itself a tick on a repeater and counts arrivals.
struct Ticker {
    ticks: Arc<AtomicU32>,
    repeater: Arc<Mutex<Option<SendRepeater>>>,
}

#[async_trait]
impl Receiver for Ticker {
    async fn receive(&mut self, ctx: &mut Context) {
        if ctx.message().downcast_ref::<Started>().is_some() {
            let pid = ctx.pid().clone();
            let repeater =
                ctx.send_repeat(&pid, msg("tick".to_string()), Duration::from_millis(10));
            *self.repeater.lock() = Some(repeater);
        } else if let Some(text) = ctx.message().downcast_ref::<String>() {
            if text == "tick" {
                self.ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[tokio::test]
async fn test_send_repeat_ticks_until_stopped() {
    let engine = engine();
    let ticks = Arc::new(AtomicU32::new(0));
    let repeater: Arc<Mutex<Option<SendRepeater>>> = Arc::default();

    let ticker = {
        let (ticks, repeater) = (Arc::clone(&ticks), Arc::clone(&repeater));
        producer(move || Ticker {
            ticks: Arc::clone(&ticks),
            repeater: Arc::clone(&repeater),
        })
    };
    let pid = engine.spawn(ticker, "ticker", Opts::new()).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while ticks.load(Ordering::SeqCst) < 3 {
        assert!(tokio::time::Instant::now() < deadline, "repeater never fired");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut handle = repeater.lock().take().unwrap();
    handle.stop();
    handle.stop(); // idempotent

    tokio::time::sleep(Duration::from_millis(30)).await;
    let frozen = ticks.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(ticks.load(Ordering::SeqCst) <= frozen + 1);

    engine.poison(&pid).wait().await;
}

async fn wait_for_pids(child: &PidSlot, grandchild: &PidSlot) -> (Pid, Pid) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let c = child.lock().clone();
        let g = grandchild.lock().clone();
        if let (Some(c), Some(g)) = (c, g) {
            return (c, g);
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "child tree never came up"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
