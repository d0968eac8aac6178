//! Periodic loops for `hook heartbeat --loop` and `team auto-heal --loop`

use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Run `tick` every `interval` until Ctrl-C
pub async fn run_every<F>(interval: Duration, tick: F) -> anyhow::Result<usize>
where
    F: FnMut() -> anyhow::Result<()>,
{
    run_until(interval, tick, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Run `tick` every `interval` until `shutdown` resolves; returns the
/// number of ticks. A failing tick is logged and the loop keeps going.
pub async fn run_until<F, S>(interval: Duration, mut tick: F, shutdown: S) -> anyhow::Result<usize>
where
    F: FnMut() -> anyhow::Result<()>,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut ticks = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Loop stopped after {} ticks", ticks);
                return Ok(ticks);
            }
            _ = ticker.tick() => {
                ticks += 1;
                if let Err(e) = tick() {
                    warn!("Loop tick {} failed: {:#}", ticks, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);
        let mut seen = 0;

        let ticks = run_until(
            Duration::from_millis(5),
            || {
                seen += 1;
                if seen == 3 {
                    if let Some(tx) = tx.take() {
                        let _ = tx.send(());
                    }
                }
                Ok(())
            },
            async {
                let _ = rx.await;
            },
        )
        .await
        .unwrap();

        assert_eq!(ticks, 3);
    }

    #[tokio::test]
    async fn test_failing_tick_does_not_end_loop() {
        let (tx, rx) = oneshot::channel::<()>();
        let mut tx = Some(tx);
        let mut calls = 0;

        let ticks = run_until(
            Duration::from_millis(5),
            || {
                calls += 1;
                if calls < 2 {
                    anyhow::bail!("host unavailable");
                }
                if let Some(tx) = tx.take() {
                    let _ = tx.send(());
                }
                Ok(())
            },
            async {
                let _ = rx.await;
            },
        )
        .await
        .unwrap();

        assert_eq!(ticks, 2);
    }
}
