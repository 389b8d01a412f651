//! Background publisher: pushes the server time to the `clock` topic.

use std::time::Duration;

use chrono::Local;
use heimdall_bifrost::Bifrost;
use heimdall_core::Html;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Topic the clock publishes on.
pub const CLOCK_TOPIC: &str = "clock";

fn render_tick() -> Html {
    Html::raw(format!(
        r##"<template heimdall-oob="true" heimdall-content-target="#clock" heimdall-content-swap="inner">{}</template>"##,
        Local::now().format("%H:%M:%S")
    ))
}

/// Publish a tick every `period` until `cancel` fires.
pub fn spawn_clock(bifrost: Bifrost, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            // Skip rendering when nobody is listening.
            if !bifrost.has_topic(CLOCK_TOPIC) {
                continue;
            }
            match bifrost.publish(CLOCK_TOPIC, render_tick(), period, &cancel) {
                Ok(report) => trace!(delivered = report.delivered, "clock tick"),
                Err(e) => warn!(error = %e, "clock publish failed"),
            }
        }
    })
}
