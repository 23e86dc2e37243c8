use crate::app::engine::{Engine, EngineError};
use crate::app::render;
use crate::channels::{ActionChoice, SignalAnswer, SignalEvent};
use crate::massban::{ConfirmationChoice, ConfirmationResponse, Delivery, JobHandle, StopOutcome};
use crate::shared::{JobId, LogLevel, TenantId};
use std::sync::Arc;

pub(crate) fn handle_signal(engine: &Engine, event: &SignalEvent) -> Result<(), EngineError> {
    match &event.choice {
        ActionChoice::Confirm(token) | ActionChoice::Cancel(token) => {
            let choice = if matches!(event.choice, ActionChoice::Confirm(_)) {
                ConfirmationChoice::Confirm
            } else {
                ConfirmationChoice::Cancel
            };
            let response = ConfirmationResponse {
                actor: event.actor.user_id.clone(),
                choice,
                payload: event.interaction.clone(),
            };
            match engine.confirmations.deliver(token, response) {
                // the waiting worker answers the interaction
                Delivery::Delivered => Ok(()),
                Delivery::NotRequester(_) | Delivery::NoWaiter(_) => {
                    answer(engine, event, SignalAnswer::Acknowledge)
                }
            }
        }
        ActionChoice::Stop(job_id) => {
            if !signal_allowed(engine, event)? {
                return answer(
                    engine,
                    event,
                    SignalAnswer::Ephemeral(render::SIGNAL_NOT_ALLOWED.to_string()),
                );
            }
            let Some(job) = tenant_job(engine, &event.tenant_id, job_id) else {
                return answer(engine, event, SignalAnswer::Acknowledge);
            };
            match engine.jobs.stop(job.job_id()) {
                StopOutcome::Requested | StopOutcome::AlreadyRequested => {
                    engine.log_fields(
                        LogLevel::Info,
                        "massban.stop_requested",
                        "stop",
                        &[
                            ("job_id", job_id.as_str()),
                            ("actor_id", event.actor.user_id.as_str()),
                            ("requester_id", job.requester_id().as_str()),
                        ],
                    );
                    answer(engine, event, SignalAnswer::Update(render::job_stopped()))
                }
                StopOutcome::NotFound => answer(engine, event, SignalAnswer::Acknowledge),
            }
        }
        ActionChoice::ViewProgress(job_id) => {
            if !signal_allowed(engine, event)? {
                return answer(
                    engine,
                    event,
                    SignalAnswer::Ephemeral(render::SIGNAL_NOT_ALLOWED.to_string()),
                );
            }
            let text = match tenant_job(engine, &event.tenant_id, job_id)
                .and_then(|job| engine.jobs.view_progress(job.job_id()))
            {
                Some(progress) => render::progress_text(progress),
                None => render::JOB_NOT_RUNNING.to_string(),
            };
            answer(engine, event, SignalAnswer::Ephemeral(text))
        }
    }
}

fn signal_allowed(engine: &Engine, event: &SignalEvent) -> Result<bool, EngineError> {
    engine.authorized(&event.actor, &event.tenant_id)
}

fn tenant_job(engine: &Engine, tenant_id: &TenantId, job_id: &JobId) -> Option<Arc<JobHandle>> {
    engine
        .jobs
        .get(job_id)
        .filter(|handle| handle.tenant_id() == tenant_id)
}

fn answer(engine: &Engine, event: &SignalEvent, answer: SignalAnswer) -> Result<(), EngineError> {
    engine.deps.transport.answer(&event.interaction, &answer)?;
    Ok(())
}
