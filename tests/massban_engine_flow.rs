use banhammer::app::render::{
    ADMIN_ONLY, JOB_NOT_RUNNING, MISSING_BAN_PERMISSION, NO_CANDIDATES, SIGNAL_NOT_ALLOWED,
};
use banhammer::app::{Engine, EngineConfig, EngineDeps};
use banhammer::channels::{
    ActionChoice, ChatTransport, CommandEvent, InboundEvent, InteractionRef, MessageRef, Reply,
    SignalAnswer, SignalEvent, TransportError,
};
use banhammer::massban::{
    BanAction, BanActionError, BanFailureCause, BanParams, FetchError, SourceFetcher,
};
use banhammer::permissions::{Actor, OverrideStore, OverrideSubject, SqliteOverrideStore};
use banhammer::shared::{
    ChannelId, ConfirmationToken, JobId, MessageId, RoleId, StatePaths, TenantId, UserId,
};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TENANT: &str = "1000";
const ADMIN: &str = "1";
const MEMBER: &str = "2";
const BYSTANDER: &str = "3";
const MODERATOR_ROLE: &str = "77";

#[derive(Default)]
struct RecordingTransport {
    replies: Mutex<Vec<Reply>>,
    edits: Mutex<Vec<(MessageRef, Reply)>>,
    answers: Mutex<Vec<(InteractionRef, SignalAnswer)>>,
    next_message: AtomicUsize,
}

impl RecordingTransport {
    fn replies(&self) -> Vec<Reply> {
        self.replies.lock().expect("lock").clone()
    }

    fn edits(&self) -> Vec<(MessageRef, Reply)> {
        self.edits.lock().expect("lock").clone()
    }

    fn answers(&self) -> Vec<(InteractionRef, SignalAnswer)> {
        self.answers.lock().expect("lock").clone()
    }

    fn reply_texts(&self) -> Vec<String> {
        self.replies()
            .into_iter()
            .filter_map(|reply| reply.text)
            .collect()
    }
}

impl ChatTransport for RecordingTransport {
    fn reply(&self, to: &CommandEvent, reply: &Reply) -> Result<MessageRef, TransportError> {
        self.replies.lock().expect("lock").push(reply.clone());
        let id = 5000 + self.next_message.fetch_add(1, Ordering::SeqCst);
        Ok(MessageRef {
            channel_id: to.source.channel_id.clone(),
            message_id: MessageId::parse(&id.to_string()).expect("message id"),
        })
    }

    fn edit(&self, message: &MessageRef, reply: &Reply) -> Result<(), TransportError> {
        self.edits
            .lock()
            .expect("lock")
            .push((message.clone(), reply.clone()));
        Ok(())
    }

    fn answer(
        &self,
        interaction: &InteractionRef,
        answer: &SignalAnswer,
    ) -> Result<(), TransportError> {
        self.answers
            .lock()
            .expect("lock")
            .push((interaction.clone(), answer.clone()));
        Ok(())
    }
}

struct StaticFetcher {
    body: Option<String>,
    calls: AtomicUsize,
}

impl SourceFetcher for StaticFetcher {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body.clone().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

struct ScriptedAction {
    failing: Vec<String>,
    calls: AtomicUsize,
    banned: Mutex<Vec<(String, BanParams)>>,
    gate_at: Option<usize>,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl BanAction for ScriptedAction {
    fn ban(
        &self,
        _tenant_id: &TenantId,
        candidate_id: &str,
        params: &BanParams,
    ) -> Result<(), BanActionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if Some(call) == self.gate_at {
            let _ = self.entered.lock().expect("lock").send(());
            let _ = self
                .release
                .lock()
                .expect("lock")
                .recv_timeout(Duration::from_secs(5));
        }
        self.banned
            .lock()
            .expect("lock")
            .push((candidate_id.to_string(), params.clone()));
        if self.failing.iter().any(|id| id == candidate_id) {
            return Err(BanActionError::new(BanFailureCause::NotFound, "unknown user"));
        }
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    engine: Arc<Engine>,
    transport: Arc<RecordingTransport>,
    fetcher: Arc<StaticFetcher>,
    action: Arc<ScriptedAction>,
    overrides: Arc<SqliteOverrideStore>,
    entered: Receiver<()>,
    release: Sender<()>,
    log_path: PathBuf,
}

struct HarnessOptions {
    body: Option<&'static str>,
    failing: &'static [&'static str],
    gate_at: Option<usize>,
    timeout: Duration,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            body: Some("ban 101 and 102\n103"),
            failing: &[],
            gate_at: None,
            timeout: Duration::from_secs(30),
        }
    }
}

fn harness(options: HarnessOptions) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = StatePaths::new(dir.path().join("state"));
    let log_path = paths.runtime_log_path();
    let overrides = Arc::new(
        SqliteOverrideStore::open(&paths.overrides_db_path()).expect("open override store"),
    );
    let transport = Arc::new(RecordingTransport::default());
    let fetcher = Arc::new(StaticFetcher {
        body: options.body.map(str::to_string),
        calls: AtomicUsize::new(0),
    });
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let action = Arc::new(ScriptedAction {
        failing: options.failing.iter().map(|id| id.to_string()).collect(),
        calls: AtomicUsize::new(0),
        banned: Mutex::new(Vec::new()),
        gate_at: options.gate_at,
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let engine = Arc::new(Engine::new(
        EngineConfig {
            command_prefix: "bh!".to_string(),
            confirmation_timeout: options.timeout,
            max_reason_chars: 512,
        },
        EngineDeps {
            transport: transport.clone(),
            action: action.clone(),
            fetcher: fetcher.clone(),
            overrides: overrides.clone(),
        },
        paths,
    ));
    Harness {
        _dir: dir,
        engine,
        transport,
        fetcher,
        action,
        overrides,
        entered: entered_rx,
        release: release_tx,
        log_path,
    }
}

fn actor(user: &str, roles: &[&str], is_admin: bool) -> Actor {
    Actor {
        user_id: UserId::parse(user).expect("user"),
        role_ids: roles
            .iter()
            .map(|role| RoleId::parse(role).expect("role"))
            .collect(),
        is_admin,
    }
}

fn tenant() -> TenantId {
    TenantId::parse(TENANT).expect("tenant")
}

fn command(actor: Actor, text: &str) -> InboundEvent {
    command_with(actor, text, Vec::new(), true)
}

fn command_with(
    actor: Actor,
    text: &str,
    attachments: Vec<String>,
    bot_can_ban: bool,
) -> InboundEvent {
    InboundEvent::Command(CommandEvent {
        actor,
        tenant_id: tenant(),
        source: MessageRef {
            channel_id: ChannelId::parse("20").expect("channel"),
            message_id: MessageId::parse("30").expect("message"),
        },
        text: text.to_string(),
        attachments,
        bot_can_ban,
    })
}

fn signal(actor: Actor, choice: ActionChoice, interaction_id: &str) -> InboundEvent {
    InboundEvent::Signal(SignalEvent {
        actor,
        tenant_id: tenant(),
        choice,
        interaction: InteractionRef {
            id: interaction_id.to_string(),
            token: format!("token-{interaction_id}"),
        },
        message: MessageRef {
            channel_id: ChannelId::parse("20").expect("channel"),
            message_id: MessageId::parse("5000").expect("message"),
        },
    })
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn await_prompt_token(h: &Harness) -> ConfirmationToken {
    let mut token = None;
    wait_until("confirmation prompt", || {
        token = h.transport.replies().into_iter().find_map(|reply| {
            reply.choices.into_iter().find_map(|choice| match choice {
                ActionChoice::Confirm(token) => Some(token),
                _ => None,
            })
        });
        token.is_some()
    });
    let token = token.expect("token");
    wait_until("registered waiter", || {
        h.engine.confirmations().is_waiting(&token)
    });
    token
}

fn stop_choice(reply: Reply) -> Option<JobId> {
    reply.choices.into_iter().find_map(|choice| match choice {
        ActionChoice::Stop(job_id) => Some(job_id),
        _ => None,
    })
}

fn card_title(answer: &SignalAnswer) -> Option<String> {
    match answer {
        SignalAnswer::Update(reply) => reply.card.as_ref().map(|card| card.title.clone()),
        _ => None,
    }
}

fn started_job_id(h: &Harness) -> JobId {
    let mut job_id = None;
    wait_until("job started notice", || {
        job_id = h
            .transport
            .answers()
            .into_iter()
            .find_map(|(_, answer)| match answer {
                SignalAnswer::Update(reply) => stop_choice(reply),
                _ => None,
            });
        job_id.is_some()
    });
    job_id.expect("job id")
}

fn card_description(reply: &Reply) -> String {
    reply
        .card
        .as_ref()
        .and_then(|card| card.description.clone())
        .unwrap_or_default()
}

fn join(worker: Option<JoinHandle<()>>) {
    worker.expect("worker spawned").join().expect("worker finished");
}

#[test]
fn out_of_range_days_are_rejected_before_any_fetch() {
    let h = harness(HarnessOptions::default());
    let worker = h
        .engine
        .handle_event(command(actor(ADMIN, &[], true), "bh!massban 9 https://ids.example/list"));
    assert!(worker.is_none());
    assert_eq!(
        h.transport.reply_texts(),
        vec!["Purge days argument should be between 0 and 7.".to_string()]
    );
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unauthorized_actors_get_no_reply_at_all() {
    let h = harness(HarnessOptions::default());
    for text in [
        "bh!massban https://ids.example/list",
        "bh!massban 9 https://ids.example/list",
        "bh!allow user 5",
        "bh!list",
        "bh!help",
    ] {
        assert!(h
            .engine
            .handle_event(command(actor(MEMBER, &["9"], false), text))
            .is_none());
    }
    assert!(h.transport.replies().is_empty());
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_ban_capability_is_reported() {
    let h = harness(HarnessOptions::default());
    let worker = h.engine.handle_event(command_with(
        actor(ADMIN, &[], true),
        "bh!massban https://ids.example/list",
        Vec::new(),
        false,
    ));
    assert!(worker.is_none());
    assert_eq!(h.transport.reply_texts(), vec![MISSING_BAN_PERMISSION.to_string()]);
}

#[test]
fn fetch_failures_and_empty_lists_end_without_prompt() {
    let h = harness(HarnessOptions {
        body: None,
        ..HarnessOptions::default()
    });
    join(h.engine.handle_event(command(
        actor(ADMIN, &[], true),
        "bh!massban https://ids.example/missing",
    )));
    let texts = h.transport.reply_texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with(":x: Could not fetch the URL."));

    let h = harness(HarnessOptions {
        body: Some("no ids in here"),
        ..HarnessOptions::default()
    });
    join(h.engine.handle_event(command(
        actor(ADMIN, &[], true),
        "bh!massban https://ids.example/empty",
    )));
    assert_eq!(h.transport.reply_texts(), vec![NO_CANDIDATES.to_string()]);
    assert!(h.engine.jobs().is_empty());
}

#[test]
fn confirmed_run_bans_every_candidate_and_reports_failures() {
    let h = harness(HarnessOptions {
        body: Some("101 102\n101 <@103>"),
        failing: &["102"],
        ..HarnessOptions::default()
    });
    let requester = actor(ADMIN, &[], true);
    let worker = h.engine.handle_event(command(
        requester.clone(),
        "bh!massban 2 https://ids.example/list spam wave",
    ));

    let token = await_prompt_token(&h);
    let prompt = h.transport.replies()[0].clone();
    assert_eq!(
        prompt.file.as_ref().map(|file| file.content.clone()),
        Some(b"101 102 101 103".to_vec())
    );
    assert!(card_description(&prompt).contains("all of the following 4 users (30 seconds)"));

    assert!(h
        .engine
        .handle_event(signal(requester, ActionChoice::Confirm(token), "900"))
        .is_none());
    join(worker);

    let banned = h.action.banned.lock().expect("lock").clone();
    let ids: Vec<&str> = banned.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["101", "102", "101", "103"]);
    assert_eq!(banned[0].1.purge_days, 2);
    assert_eq!(banned[0].1.reason.as_deref(), Some("spam wave"));
    assert_eq!(banned[0].1.delete_message_seconds(), 2 * 86_400);

    let answers = h.transport.answers();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].0.id, "900");

    let (edited, report) = h.transport.edits().last().cloned().expect("report edit");
    assert_eq!(edited.message_id.as_str(), "5000");
    assert_eq!(
        card_description(&report),
        "Attempted massbanning 4 - 3 passed, 1 failed."
    );
    assert_eq!(
        report.file.map(|file| (file.name, file.content)),
        Some(("failed.txt".to_string(), b"102".to_vec()))
    );
    assert!(h.engine.jobs().is_empty());
}

#[test]
fn cancel_and_stray_responses_never_ban() {
    let h = harness(HarnessOptions::default());
    let requester = actor(ADMIN, &[], true);
    let worker = h.engine.handle_event(command(
        requester.clone(),
        "bh!massban https://ids.example/list",
    ));
    let token = await_prompt_token(&h);

    h.engine.handle_event(signal(
        actor(BYSTANDER, &[], true),
        ActionChoice::Confirm(token.clone()),
        "901",
    ));
    assert!(h.engine.confirmations().is_waiting(&token));

    h.engine
        .handle_event(signal(requester.clone(), ActionChoice::Cancel(token.clone()), "902"));
    join(worker);

    assert_eq!(h.action.calls.load(Ordering::SeqCst), 0);
    let answers = h.transport.answers();
    assert_eq!(answers[0].0.id, "901");
    assert_eq!(answers[0].1, SignalAnswer::Acknowledge);
    assert_eq!(answers[1].0.id, "902");
    assert_eq!(card_title(&answers[1].1).as_deref(), Some("Canceled"));

    h.engine
        .handle_event(signal(requester, ActionChoice::Confirm(token), "903"));
    assert_eq!(h.transport.answers()[2].1, SignalAnswer::Acknowledge);
    assert_eq!(h.action.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn silence_expires_the_prompt() {
    let h = harness(HarnessOptions {
        timeout: Duration::from_millis(50),
        ..HarnessOptions::default()
    });
    join(h.engine.handle_event(command(
        actor(ADMIN, &[], true),
        "bh!massban https://ids.example/list",
    )));
    let edits = h.transport.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(
        edits[0].1.card.as_ref().map(|card| card.title.as_str()),
        Some("Canceled")
    );
    assert_eq!(h.action.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn stop_halts_between_candidates_and_view_reports_progress() {
    let h = harness(HarnessOptions {
        body: Some("11 12 13 14"),
        gate_at: Some(1),
        ..HarnessOptions::default()
    });
    let requester = actor(ADMIN, &[], true);
    let worker = h.engine.handle_event(command(
        requester.clone(),
        "bh!massban https://ids.example/list",
    ));
    let token = await_prompt_token(&h);
    h.engine
        .handle_event(signal(requester.clone(), ActionChoice::Confirm(token), "910"));
    h.entered
        .recv_timeout(Duration::from_secs(5))
        .expect("second ban started");
    let job_id = started_job_id(&h);

    h.engine.handle_event(signal(
        actor(BYSTANDER, &[], false),
        ActionChoice::ViewProgress(job_id.clone()),
        "911",
    ));
    h.engine.handle_event(signal(
        requester.clone(),
        ActionChoice::ViewProgress(job_id.clone()),
        "912",
    ));
    h.engine
        .handle_event(signal(requester.clone(), ActionChoice::Stop(job_id.clone()), "913"));
    h.release.send(()).expect("release gate");
    join(worker);

    let answers = h.transport.answers();
    let by_id = |id: &str| {
        answers
            .iter()
            .find(|(interaction, _)| interaction.id == id)
            .map(|(_, answer)| answer.clone())
            .expect("answer")
    };
    assert_eq!(
        by_id("911"),
        SignalAnswer::Ephemeral(SIGNAL_NOT_ALLOWED.to_string())
    );
    assert_eq!(
        by_id("912"),
        SignalAnswer::Ephemeral("I have processed 1 / 4 bans.".to_string())
    );
    assert_eq!(card_title(&by_id("913")).as_deref(), Some("Stopped"));

    let log = fs::read_to_string(&h.log_path).expect("runtime log");
    let stop_line: serde_json::Value = log
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .find(|entry: &serde_json::Value| entry["event"] == "massban.stop_requested")
        .expect("stop logged");
    assert_eq!(stop_line["job_id"], job_id.as_str());
    assert_eq!(stop_line["requester_id"], ADMIN);

    assert_eq!(h.action.calls.load(Ordering::SeqCst), 2);
    assert!(h.transport.edits().is_empty());
    assert!(!h.engine.jobs().contains(&job_id));

    h.engine
        .handle_event(signal(requester.clone(), ActionChoice::ViewProgress(job_id.clone()), "914"));
    h.engine
        .handle_event(signal(requester, ActionChoice::Stop(job_id), "915"));
    let answers = h.transport.answers();
    assert_eq!(
        answers[answers.len() - 2].1,
        SignalAnswer::Ephemeral(JOB_NOT_RUNNING.to_string())
    );
    assert_eq!(answers[answers.len() - 1].1, SignalAnswer::Acknowledge);
}

#[test]
fn override_commands_are_admin_only_and_idempotent() {
    let h = harness(HarnessOptions::default());
    let admin = actor(ADMIN, &[], true);

    h.engine
        .handle_event(command(admin.clone(), "bh!allow user <@!2>"));
    h.engine
        .handle_event(command(admin.clone(), "bh!allow user 2"));
    h.engine.handle_event(command(
        admin.clone(),
        &format!("bh!allow role <@&{MODERATOR_ROLE}>"),
    ));
    h.engine
        .handle_event(command(admin.clone(), "bh!allow group 2"));
    assert_eq!(
        h.transport.reply_texts()[..3],
        [
            ":white_check_mark: <@2> can now run massbans.".to_string(),
            "<@2> can already run massbans.".to_string(),
            format!(":white_check_mark: <@&{MODERATOR_ROLE}> can now run massbans."),
        ]
    );
    assert!(h.transport.reply_texts()[3].contains("Usage: `bh!allow user"));

    let record = h.overrides.get(&tenant()).expect("get").expect("record");
    assert!(record.users.contains(&UserId::parse(MEMBER).expect("user")));
    assert!(record
        .roles
        .contains(&RoleId::parse(MODERATOR_ROLE).expect("role")));

    let granted_member = actor(MEMBER, &[], false);
    h.engine
        .handle_event(command(granted_member.clone(), "bh!deny user 2"));
    assert_eq!(
        h.transport.reply_texts().last().cloned(),
        Some(ADMIN_ONLY.to_string())
    );

    h.engine
        .handle_event(command(actor(BYSTANDER, &[MODERATOR_ROLE], false), "bh!list"));
    let listing = h.transport.replies().last().cloned().expect("listing");
    let listing = card_description(&listing);
    assert!(listing.contains("Users: <@2>"));
    assert!(listing.contains(&format!("Roles: <@&{MODERATOR_ROLE}>")));

    h.engine
        .handle_event(command(admin.clone(), "bh!deny user 2"));
    h.engine.handle_event(command(admin, "bh!deny user 2"));
    let texts = h.transport.reply_texts();
    assert_eq!(
        texts[texts.len() - 2..],
        [
            ":white_check_mark: <@2> can no longer run massbans.".to_string(),
            "<@2> had no massban access to remove.".to_string(),
        ]
    );

    let before = h.transport.replies().len();
    h.engine
        .handle_event(command(granted_member, "bh!massban https://ids.example/list"));
    assert_eq!(h.transport.replies().len(), before);

    let record = h.overrides.get(&tenant()).expect("get").expect("record kept");
    assert!(record.users.is_empty());
    let never_granted = OverrideSubject::User(UserId::parse("404").expect("user"));
    assert!(!h.overrides.revoke(&tenant(), &never_granted).expect("revoke"));
}

#[test]
fn attachment_source_and_conflicts() {
    let h = harness(HarnessOptions {
        timeout: Duration::from_millis(20),
        ..HarnessOptions::default()
    });
    let admin = actor(ADMIN, &[], true);
    h.engine.handle_event(command_with(
        admin.clone(),
        "bh!massban https://ids.example/list",
        vec!["https://cdn.example/ids.txt".to_string()],
        true,
    ));
    h.engine.handle_event(command_with(
        admin.clone(),
        "bh!massban 1 reason",
        vec![
            "https://cdn.example/a.txt".to_string(),
            "https://cdn.example/b.txt".to_string(),
        ],
        true,
    ));
    assert_eq!(
        h.transport.reply_texts(),
        vec![
            "Provide either a URL or one attached file, not both.".to_string(),
            "Please attach at most one file.".to_string(),
        ]
    );
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 0);

    join(h.engine.handle_event(command_with(
        admin,
        "bh!massban 3 raid accounts",
        vec!["https://cdn.example/ids.txt".to_string()],
        true,
    )));
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);
}
