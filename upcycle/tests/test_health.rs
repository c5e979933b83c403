//! Health wait-loop behavior

mod common;

use std::time::Duration;

use tokio::sync::broadcast;
use url::Url;

use common::FakeProbe;
use upcycle::health::{wait_healthy, ProbeOptions};

fn endpoint() -> Url {
    Url::parse("http://localhost/bot/health").unwrap()
}

fn options() -> ProbeOptions {
    ProbeOptions {
        interval: Duration::from_millis(20),
        timeout: Duration::from_millis(500),
    }
}

#[tokio::test]
async fn reports_attempts_until_healthy() {
    let probe = FakeProbe::standalone();
    probe.set_warmup(&endpoint(), 1);

    let (_tx, mut rx) = broadcast::channel(1);
    let report = wait_healthy(&probe, &endpoint(), &options(), &mut rx).await;

    assert!(report.healthy);
    assert_eq!(report.attempts, 2);
    assert!(!report.interrupted);
}

#[tokio::test]
async fn reports_unhealthy_after_timeout() {
    let probe = FakeProbe::standalone();
    probe.set_warmup(&endpoint(), u32::MAX);

    let options = ProbeOptions {
        interval: Duration::from_millis(20),
        timeout: Duration::from_millis(50),
    };
    let (_tx, mut rx) = broadcast::channel(1);
    let report = wait_healthy(&probe, &endpoint(), &options, &mut rx).await;

    assert!(!report.healthy);
    assert!(!report.interrupted);
    // ~3 polls fit the 50ms budget at 20ms intervals
    assert!((2..=4).contains(&report.attempts), "attempts = {}", report.attempts);
}

#[tokio::test]
async fn interrupt_cuts_the_wait_short() {
    let probe = FakeProbe::standalone();
    probe.set_warmup(&endpoint(), u32::MAX);

    let options = ProbeOptions {
        interval: Duration::from_millis(100),
        timeout: Duration::from_secs(10),
    };
    let (tx, mut rx) = broadcast::channel(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = tx.send(());
    });

    let report = wait_healthy(&probe, &endpoint(), &options, &mut rx).await;

    assert!(!report.healthy);
    assert!(report.interrupted);
    assert_eq!(report.attempts, 1);
}
