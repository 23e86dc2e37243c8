use crate::app::engine::{Engine, EngineError};
use crate::app::render;
use crate::channels::{CommandEvent, MessageRef, Reply, SignalAnswer};
use crate::massban::{
    await_decision, extract_candidate_ids, parse_massban_args, ConfirmationState, JobOutcome,
    JobSpec, MassbanRequest, PendingConfirmation,
};
use crate::shared::{ConfirmationToken, LogLevel};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MassbanOutcome {
    FetchFailed,
    NoCandidates,
    NotConfirmed(ConfirmationState),
    Finished(JobOutcome),
}

pub(crate) fn handle_massban(
    engine: &Arc<Engine>,
    event: &CommandEvent,
    args: &str,
) -> Result<Option<JoinHandle<()>>, EngineError> {
    let parsed = parse_massban_args(args, &event.attachments, engine.config.max_reason_chars);

    if !engine.authorized(&event.actor, &event.tenant_id)? {
        return Ok(None);
    }
    let transport = &engine.deps.transport;
    if !event.bot_can_ban {
        transport.reply(event, &Reply::text(render::MISSING_BAN_PERMISSION))?;
        return Ok(None);
    }
    let request = match parsed {
        Ok(request) => request,
        Err(err) => {
            engine.log_fields(
                LogLevel::Info,
                "massban.rejected",
                &err.to_string(),
                &[("tenant_id", event.tenant_id.as_str())],
            );
            transport.reply(event, &Reply::text(err.user_message()))?;
            return Ok(None);
        }
    };

    let worker_engine = Arc::clone(engine);
    let event = event.clone();
    Ok(Some(thread::spawn(move || {
        if let Err(err) = run_massban(&worker_engine, &event, request) {
            worker_engine.log_fields(
                LogLevel::Error,
                "massban.error",
                &err.to_string(),
                &[("tenant_id", event.tenant_id.as_str())],
            );
        }
    })))
}

pub fn run_massban(
    engine: &Engine,
    event: &CommandEvent,
    request: MassbanRequest,
) -> Result<MassbanOutcome, EngineError> {
    let transport = &engine.deps.transport;
    let tenant = event.tenant_id.as_str();

    let text = match engine.deps.fetcher.fetch_text(request.source.url()) {
        Ok(text) => text,
        Err(err) => {
            engine.log_fields(
                LogLevel::Warn,
                "massban.fetch_failed",
                &err.to_string(),
                &[("tenant_id", tenant)],
            );
            transport.reply(event, &Reply::text(err.user_message()))?;
            return Ok(MassbanOutcome::FetchFailed);
        }
    };

    let candidate_ids = extract_candidate_ids(&text);
    if candidate_ids.is_empty() {
        transport.reply(event, &Reply::text(render::NO_CANDIDATES))?;
        return Ok(MassbanOutcome::NoCandidates);
    }

    let token = ConfirmationToken::generate();
    let responses = engine
        .confirmations
        .register(token.clone(), event.actor.user_id.clone());
    let timeout = engine.config.confirmation_timeout;
    let prompt = match transport.reply(
        event,
        &render::confirmation_prompt(&candidate_ids, timeout, &token),
    ) {
        Ok(prompt) => prompt,
        Err(err) => {
            engine.confirmations.release(&token);
            return Err(err.into());
        }
    };

    let mut pending =
        PendingConfirmation::new(event.actor.user_id.clone(), Instant::now(), timeout);
    let decision = await_decision(&mut pending, &responses);
    engine.confirmations.release(&token);

    if decision.state != ConfirmationState::Confirmed {
        let closed = render::confirmation_closed();
        match &decision.response {
            Some(interaction) => transport.answer(interaction, &SignalAnswer::Update(closed))?,
            None => transport.edit(&prompt, &closed)?,
        }
        engine.log_fields(
            LogLevel::Info,
            "massban.not_confirmed",
            &decision.state.to_string(),
            &[("tenant_id", tenant)],
        );
        return Ok(MassbanOutcome::NotConfirmed(decision.state));
    }

    let total = candidate_ids.len().to_string();
    let job_id = engine.jobs.create_job(JobSpec {
        requester_id: event.actor.user_id.clone(),
        tenant_id: event.tenant_id.clone(),
        candidate_ids,
        params: request.params,
    });
    engine.log_fields(
        LogLevel::Info,
        "massban.job_created",
        "confirmed",
        &[
            ("tenant_id", tenant),
            ("job_id", job_id.as_str()),
            ("total", total.as_str()),
        ],
    );

    let started = render::job_started(&job_id);
    let shown = match &decision.response {
        Some(interaction) => transport.answer(interaction, &SignalAnswer::Update(started)),
        None => transport.edit(&prompt, &started),
    };
    if let Err(err) = shown {
        engine.log_fields(
            LogLevel::Warn,
            "massban.started_notice_failed",
            &err.to_string(),
            &[("job_id", job_id.as_str())],
        );
    }

    let outcome = engine.jobs.run_with_observer(
        &job_id,
        engine.deps.action.as_ref(),
        |candidate, failure| {
            engine.log_fields(
                LogLevel::Warn,
                "massban.ban_failed",
                &failure.detail,
                &[
                    ("job_id", job_id.as_str()),
                    ("candidate_id", candidate),
                    ("cause", failure.cause.as_str()),
                ],
            );
        },
    )?;

    report_outcome(engine, &prompt, &outcome)?;
    Ok(MassbanOutcome::Finished(outcome))
}

fn report_outcome(
    engine: &Engine,
    prompt: &MessageRef,
    outcome: &JobOutcome,
) -> Result<(), EngineError> {
    let summary = outcome.summary();
    let processed = summary.processed.to_string();
    let failed = summary.failed.len().to_string();
    let fields = [
        ("job_id", summary.job_id.as_str()),
        ("processed", processed.as_str()),
        ("failed", failed.as_str()),
    ];
    match outcome {
        JobOutcome::Completed(summary) => {
            engine.log_fields(LogLevel::Info, "massban.job_completed", "completed", &fields);
            engine
                .deps
                .transport
                .edit(prompt, &render::job_completed(summary))?;
        }
        JobOutcome::Cancelled(_) => {
            engine.log_fields(LogLevel::Info, "massban.job_cancelled", "stopped", &fields);
        }
    }
    Ok(())
}
