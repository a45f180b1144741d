//! Scripted hardware link for resilience testing.
//!
//! [`ScriptedLinkOpener`] implements [`LinkOpener`] by replaying a queue of
//! [`LinkScript`]s, one per `open()` call. Each script decides whether the open
//! fails, hangs (to exercise the open timeout) or succeeds with a sequence of
//! [`LinkStep`]s. Once the queue is empty every further open fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use freshtrack_driver_sim::{LinkScript, LinkStep, ScriptedLinkOpener};
//!
//! let opener = ScriptedLinkOpener::new([
//!     LinkScript::FailOpen("port busy".into()),
//!     LinkScript::Connect(vec![
//!         LinkStep::Line(r#"{"temperature": 4.2, "humidity": 61}"#.into()),
//!         LinkStep::Close,
//!     ]),
//! ]);
//! ```

use async_trait::async_trait;
use freshtrack_core::error::{AppResult, FaultKind, FreshError};
use freshtrack_core::link::{LineSource, LinkOpener};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of one `open()` call.
#[derive(Debug, Clone)]
pub enum LinkScript {
    /// Fail immediately with the given message.
    FailOpen(String),
    /// Never complete; the caller's open timeout must fire.
    HangOnOpen,
    /// Open successfully and replay the steps.
    Connect(Vec<LinkStep>),
}

/// One event on an open scripted link.
#[derive(Debug, Clone)]
pub enum LinkStep {
    /// Deliver a text line.
    Line(String),
    /// Report a channel-level error.
    Fault(FaultKind),
    /// Close the channel from the device side.
    Close,
    /// Wait before the next step.
    Delay(Duration),
}

/// Record of an `open()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// Device path requested.
    pub path: String,
    /// Baud rate requested.
    pub baud_rate: u32,
}

/// Replays scripted outcomes for successive opens.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLinkOpener {
    scripts: Arc<Mutex<VecDeque<LinkScript>>>,
    requests: Arc<Mutex<Vec<OpenRequest>>>,
}

impl ScriptedLinkOpener {
    /// Create an opener with the given scripts, consumed in order.
    pub fn new(scripts: impl IntoIterator<Item = LinkScript>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An opener whose every open fails.
    pub fn always_failing() -> Self {
        Self::default()
    }

    /// Queue another script.
    pub fn push(&self, script: LinkScript) {
        self.scripts.lock().push_back(script);
    }

    /// Every open request received so far.
    pub fn requests(&self) -> Vec<OpenRequest> {
        self.requests.lock().clone()
    }

    /// Number of open calls received so far.
    pub fn open_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LinkOpener for ScriptedLinkOpener {
    async fn open(&self, path: &str, baud_rate: u32) -> AppResult<Box<dyn LineSource>> {
        self.requests.lock().push(OpenRequest {
            path: path.to_string(),
            baud_rate,
        });
        let script = self.scripts.lock().pop_front();
        match script {
            Some(LinkScript::Connect(steps)) => Ok(Box::new(ScriptedLineSource {
                steps: steps.into(),
            })),
            Some(LinkScript::HangOnOpen) => futures::future::pending().await,
            Some(LinkScript::FailOpen(message)) => Err(FreshError::ChannelOpen {
                path: path.to_string(),
                message,
            }),
            None => Err(FreshError::ChannelOpen {
                path: path.to_string(),
                message: "no such device".to_string(),
            }),
        }
    }
}

/// Line source replaying [`LinkStep`]s; stays open once the steps run out.
#[derive(Debug)]
pub struct ScriptedLineSource {
    steps: VecDeque<LinkStep>,
}

#[async_trait]
impl LineSource for ScriptedLineSource {
    async fn next_line(&mut self) -> AppResult<Option<String>> {
        loop {
            match self.steps.pop_front() {
                Some(LinkStep::Line(line)) => return Ok(Some(line)),
                Some(LinkStep::Fault(kind)) => {
                    return Err(FreshError::ChannelFault {
                        kind,
                        message: format!("scripted {} fault", kind),
                    })
                }
                Some(LinkStep::Close) => return Ok(None),
                Some(LinkStep::Delay(delay)) => tokio::time::sleep(delay).await,
                None => futures::future::pending::<()>().await,
            }
        }
    }
}
