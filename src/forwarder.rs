// src/forwarder.rs
//! Read → parse → send loop

use crate::{
    gps::{
        nmea::{self, Rejection},
        serial::{Connector, PortReader, SerialConnector},
    },
    uplink::{Ack, SendError, UplinkSender},
};
use std::{fmt, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderState {
    /// No device handle; the reader is (re)opening the port
    Disconnected,
    /// Reading lines from the device
    Connected,
    /// A fix is being delivered
    Sending,
    /// The last delivery failed; the next fix is sent without waiting for the cadence
    Backoff,
}

impl fmt::Display for ForwarderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwarderState::Disconnected => write!(f, "disconnected"),
            ForwarderState::Connected => write!(f, "connected"),
            ForwarderState::Sending => write!(f, "sending"),
            ForwarderState::Backoff => write!(f, "backoff"),
        }
    }
}

/// Result of processing one line
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Line produced no fix
    Ignored(Rejection),
    /// Fix skipped because the last delivery was too recent
    Throttled,
    Delivered(Ack),
    /// Delivery failed; the fix was dropped
    Dropped(SendError),
}

pub struct Forwarder<C: Connector = SerialConnector> {
    reader: PortReader<C>,
    sender: UplinkSender,
    send_interval: Duration,
    last_delivery: Option<Instant>,
    state: ForwarderState,
}

impl<C: Connector> Forwarder<C> {
    pub fn new(reader: PortReader<C>, sender: UplinkSender, send_interval: Duration) -> Self {
        Self {
            reader,
            sender,
            send_interval,
            last_delivery: None,
            state: ForwarderState::Disconnected,
        }
    }

    pub fn state(&self) -> ForwarderState {
        self.state
    }

    /// Forward fixes until the future is dropped
    pub async fn run(&mut self) {
        info!(
            "Forwarding fixes from {} to {} (interval {:?})",
            self.reader.config().path,
            self.sender.config().url,
            self.send_interval
        );

        loop {
            self.step().await;
        }
    }

    /// Process exactly one line from the device
    pub async fn step(&mut self) -> StepOutcome {
        let line = self.reader.next_line().await;
        if self.state == ForwarderState::Disconnected {
            self.transition(ForwarderState::Connected);
        }

        let fix = match nmea::classify(&line) {
            Ok(fix) => fix,
            Err(reason) => {
                trace!("Ignoring line ({}): {}", reason, line);
                self.refresh_link_state();
                return StepOutcome::Ignored(reason);
            }
        };

        if self.state != ForwarderState::Backoff && !self.interval_elapsed() {
            trace!("Fix at {} throttled", fix.time);
            self.refresh_link_state();
            return StepOutcome::Throttled;
        }

        self.transition(ForwarderState::Sending);
        let outcome = match self.sender.send(&fix, &line).await {
            Ok(ack) => {
                info!(
                    "GPS position {:.6}, {:.6} delivered (HTTP {}, {} attempt(s))",
                    fix.latitude, fix.longitude, ack.status, ack.attempts
                );
                self.last_delivery = Some(Instant::now());
                self.transition(ForwarderState::Connected);
                StepOutcome::Delivered(ack)
            }
            Err(e) => {
                warn!("Dropped fix {:.6}, {:.6}: {}", fix.latitude, fix.longitude, e);
                self.transition(ForwarderState::Backoff);
                StepOutcome::Dropped(e)
            }
        };

        self.refresh_link_state();
        outcome
    }

    /// Release the serial device
    pub fn close(&mut self) {
        self.reader.close();
        self.transition(ForwarderState::Disconnected);
        info!("Serial port {} released", self.reader.config().path);
    }

    fn interval_elapsed(&self) -> bool {
        match self.last_delivery {
            Some(at) => at.elapsed() >= self.send_interval,
            None => true,
        }
    }

    /// The reader reconnects on its own; mirror a dropped handle here
    fn refresh_link_state(&mut self) {
        if !self.reader.is_connected() && self.state != ForwarderState::Backoff {
            self.transition(ForwarderState::Disconnected);
        }
    }

    fn transition(&mut self, next: ForwarderState) {
        if self.state != next {
            debug!("Forwarder {} -> {}", self.state, next);
            self.state = next;
        }
    }
}
