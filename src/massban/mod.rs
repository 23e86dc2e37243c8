pub mod action;
pub mod confirmation;
pub mod extract;
pub mod fetch;
pub mod job;
pub mod request;

pub use action::{BanAction, BanActionError, BanFailureCause};
pub use confirmation::{
    await_decision, ConfirmationChoice, ConfirmationOutcome, ConfirmationResponse,
    ConfirmationRouter, ConfirmationState, Delivery, PendingConfirmation,
};
pub use extract::extract_candidate_ids;
pub use fetch::{FetchError, HttpSourceFetcher, SourceFetcher};
pub use job::{
    JobError, JobHandle, JobOutcome, JobProgress, JobRegistry, JobSpec, JobSummary, StopOutcome,
};
pub use request::{parse_massban_args, BanParams, ListSource, MassbanRequest, RequestError};
