// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::initializer::EventRecorder;
use crate::infrastructure::constants::{EVENT_ACTION_INITIALIZE, EVENT_REPORTER};
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tokio::sync::mpsc;
use tracing::warn;

struct PendingEvent {
    target: ObjectReference,
    event_type: EventType,
    reason: String,
    message: String,
}

/// Buffered event sink. `event` only enqueues; a background task
/// publishes to the API server and logs failures.
#[derive(Clone)]
pub struct KubeEventRecorder {
    tx: mpsc::UnboundedSender<PendingEvent>,
}

impl KubeEventRecorder {
    pub fn new(client: Client) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(publish_events(client, rx));
        Self { tx }
    }
}

impl EventRecorder for KubeEventRecorder {
    fn event(&self, target: &ObjectReference, event_type: EventType, reason: &str, message: &str) {
        let pending = PendingEvent {
            target: target.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
        };
        if self.tx.send(pending).is_err() {
            warn!(reason, "Event publisher stopped, dropping event");
        }
    }
}

async fn publish_events(client: Client, mut rx: mpsc::UnboundedReceiver<PendingEvent>) {
    let reporter = Reporter {
        controller: EVENT_REPORTER.to_string(),
        instance: None,
    };

    while let Some(pending) = rx.recv().await {
        let recorder = Recorder::new(client.clone(), reporter.clone(), pending.target);
        let event = Event {
            type_: pending.event_type,
            reason: pending.reason.clone(),
            note: Some(pending.message),
            action: EVENT_ACTION_INITIALIZE.to_string(),
            secondary: None,
        };

        if let Err(e) = recorder.publish(event).await {
            warn!(
                reason = %pending.reason,
                action = EVENT_ACTION_INITIALIZE,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}
