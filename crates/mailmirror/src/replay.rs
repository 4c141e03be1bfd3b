//! Drives a session's steps through a [`SyncEngine`] and reports what happened.

use mailmirror_core::{
    Conversation, ConversationId, Message, PageOutcome, ReconcileOutcome, SearchWindow,
    SyncEngine,
};
use mailmirror_wire::MailTransport;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::session::Step;

/// What one step did.
#[derive(Debug, Serialize)]
pub struct StepReport {
    /// Position in the session.
    pub index: usize,
    /// Step name.
    pub step: &'static str,
    /// Step-specific result, absent on error.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub result: Value,
    /// Error message, if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Window state after the step.
    pub window: SearchWindow,
}

/// Final state after the replay.
#[derive(Debug, Serialize)]
pub struct Summary {
    /// Per-step reports.
    pub steps: Vec<StepReport>,
    /// Conversations in window order.
    pub conversations: Vec<Conversation>,
    /// Messages in window order, for message queries.
    pub messages: Vec<Message>,
    /// Whether the reconciler is still waiting for a resync.
    pub resync_pending: bool,
}

/// Runs every step in order.
///
/// A failing step is recorded and the replay continues, so one bad response
/// does not hide what the rest of the session does.
pub async fn run<T: MailTransport>(engine: &SyncEngine<T>, steps: &[Step]) -> Summary {
    let mut reports = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let (result, error) = match run_step(engine, step).await {
            Ok(result) => (result, None),
            Err(err) => {
                warn!(index, step = step.name(), error = %err, "Step failed");
                (Value::Null, Some(format!("{err:#}")))
            }
        };
        reports.push(StepReport {
            index,
            step: step.name(),
            result,
            error,
            window: engine.window_snapshot(),
        });
    }

    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    info!(steps = reports.len(), failed, "Replay finished");
    Summary {
        steps: reports,
        conversations: engine.visible_conversations(),
        messages: engine.visible_messages(),
        resync_pending: engine.resync_pending(),
    }
}

async fn run_step<T: MailTransport>(engine: &SyncEngine<T>, step: &Step) -> anyhow::Result<Value> {
    let value = match step {
        Step::Search { query } => page_json(engine.search(query).await?),
        Step::LoadMore => page_json(engine.load_more().await?),
        Step::Expand { conversation } => {
            let status = engine
                .expand_conversation(&ConversationId::new(conversation.as_str()))
                .await?;
            json!({ "status": status })
        }
        Step::Notify { notify } => match engine.handle_notify(notify).await? {
            ReconcileOutcome::Applied(report) => json!({ "applied": report }),
            ReconcileOutcome::ResyncRequired(reason) => json!({ "resync": reason.to_string() }),
            ReconcileOutcome::Discarded => json!({ "discarded": true }),
        },
        Step::Action(action) => {
            let action = action.to_action()?;
            engine.perform(action).await?;
            json!({ "performed": true })
        }
        Step::Resync => {
            engine.resync().await?;
            json!({ "resynced": true })
        }
    };
    Ok(value)
}

fn page_json(outcome: PageOutcome) -> Value {
    match outcome {
        PageOutcome::Applied { hits, more } => json!({ "hits": hits, "more": more }),
        PageOutcome::Stale => json!({ "stale": true }),
        PageOutcome::Exhausted => json!({ "exhausted": true }),
    }
}
