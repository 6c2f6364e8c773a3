use crate::managers::poll::{Poll, PollStore};
use crate::span::{AsyncSpanHandler, SpanHandler};
use crate::{async_handler_with_span, handler_with_span};
use actix::prelude::*;
use actix_interop::{with_ctx, FutureInterop};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, Span};

// Messages

/// Create a poll from a decoded request body
/// (`cQuestionName`, `cEndTime`, `cOptions`, `cVoters`, `cOptionsVoted`).
#[derive(Message, Debug)]
#[rtype(result = "Result<Poll, &'static str>")]
pub struct CreatePoll(pub Value);

/// All polls, ongoing first by end time, then closed polls most recently
/// closed first.
#[derive(Message, Debug)]
#[rtype(result = "Vec<Poll>")]
pub struct ListPolls;

/// Look up one poll from a decoded request body (`cQuestionName`).
#[derive(Message, Debug)]
#[rtype(result = "Result<Poll, &'static str>")]
pub struct PollByName(pub Value);

/// Record a vote from a decoded request body
/// (`cQuestionName`, `cVoterName`, `cChosenOpt`).
#[derive(Message, Debug)]
#[rtype(result = "Result<VoteReceipt, &'static str>")]
pub struct RecordVote(pub Value);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub voter_recorded: String,
    pub option_voted_recorded: String,
}

// Actor

/// Owns the poll store. The mailbox serializes all operations, so every
/// check-then-act sequence below runs without interleaving.
pub struct PollActor {
    store: PollStore,
}

impl PollActor {
    pub fn new() -> Self {
        Self {
            store: PollStore::new(),
        }
    }

    fn create(&mut self, body: Value) -> Result<Poll, &'static str> {
        let question_name = body
            .get("cQuestionName")
            .and_then(Value::as_str)
            .ok_or("sQuestionName is missing or not of type string")?;
        let end_time = body
            .get("cEndTime")
            .and_then(Value::as_f64)
            .ok_or("sEndTime is missing or not of type number")?;
        let options = match body.get("cOptions").and_then(Value::as_array) {
            Some(raw) => string_elements(raw).ok_or("Elements of sOptions[] are not string!")?,
            None => return Err("sOptions is missing or not of type array!"),
        };
        // The creating client sends both vote arrays empty, but they are
        // validated regardless.
        let voters_raw = body.get("cVoters").and_then(Value::as_array);
        let voted_raw = body.get("cOptionsVoted").and_then(Value::as_array);
        let (voters_raw, voted_raw) = match (voters_raw, voted_raw) {
            (Some(voters), Some(voted)) => (voters, voted),
            _ => return Err("sVoters or sOptionsVoted is missing or not of type array!"),
        };
        let voters = string_elements(voters_raw).ok_or("sVoters elements should be strings!")?;
        let options_voted =
            string_elements(voted_raw).ok_or("sOptionsVoted elements should be strings!")?;

        let poll = Poll {
            question_name: question_name.to_owned(),
            end_time,
            options,
            voters,
            options_voted,
        };
        if !self.store.insert(poll.clone()) {
            return Err("The question name is not unique! Pick a new question name!");
        }
        info!("Created poll {}", poll.question_name);
        Ok(poll)
    }

    fn poll_by_name(&self, body: Value) -> Result<Poll, &'static str> {
        let name = body
            .get("cQuestionName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or("The question name is undefined or not of type string!")?;
        self.store
            .get(name)
            .cloned()
            .ok_or("The question name is not in the server!")
    }

    fn record_vote(&mut self, body: Value) -> Result<VoteReceipt, &'static str> {
        let name = body
            .get("cQuestionName")
            .and_then(Value::as_str)
            .ok_or("The question name is undefined or not of type string!")?;
        let voter = body
            .get("cVoterName")
            .and_then(Value::as_str)
            .filter(|voter| !voter.is_empty())
            .ok_or("The given voterName is undefined or not of type string or empty!")?;
        let option = body
            .get("cChosenOpt")
            .and_then(Value::as_str)
            .ok_or("The chosen options is undefined or not of type string!")?;

        let poll = self
            .store
            .get_mut(name)
            .ok_or("The question name is not part of a pollmap from server data!")?;
        poll.record_vote(voter, option)?;
        info!("Recorded vote by {} in {}", voter, name);
        Ok(VoteReceipt {
            voter_recorded: voter.to_owned(),
            option_voted_recorded: option.to_owned(),
        })
    }
}

impl Default for PollActor {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for PollActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!("Poll actor started");
    }
}

fn string_elements(values: &[Value]) -> Option<Vec<String>> {
    values
        .iter()
        .map(|v| v.as_str().map(str::to_owned))
        .collect()
}

fn unix_time_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as f64
}

// Handlers

handler_with_span! {
    impl SpanHandler<CreatePoll> for PollActor {
        type Result = ResponseActFuture<Self, <CreatePoll as Message>::Result>;

        fn handle(&mut self, msg: CreatePoll, _ctx: &mut Context<Self>, _span: Span) -> Self::Result {
            debug!("Handling poll creation");
            async move {
                with_ctx(|actor: &mut PollActor, _| actor.create(msg.0))
            }
            .interop_actor_boxed(self)
        }
    }
}

handler_with_span! {
    impl SpanHandler<PollByName> for PollActor {
        type Result = ResponseActFuture<Self, <PollByName as Message>::Result>;

        fn handle(&mut self, msg: PollByName, _ctx: &mut Context<Self>, _span: Span) -> Self::Result {
            debug!("Handling poll lookup");
            async move {
                with_ctx(|actor: &mut PollActor, _| actor.poll_by_name(msg.0))
            }
            .interop_actor_boxed(self)
        }
    }
}

handler_with_span! {
    impl SpanHandler<RecordVote> for PollActor {
        type Result = ResponseActFuture<Self, <RecordVote as Message>::Result>;

        fn handle(&mut self, msg: RecordVote, _ctx: &mut Context<Self>, _span: Span) -> Self::Result {
            debug!("Handling vote");
            async move {
                with_ctx(|actor: &mut PollActor, _| actor.record_vote(msg.0))
            }
            .interop_actor_boxed(self)
        }
    }
}

async_handler_with_span! {
    impl AsyncSpanHandler<ListPolls> for PollActor {
        async fn handle(_msg: ListPolls) -> Vec<Poll> {
            debug!("Listing polls");
            let now = unix_time_ms();
            with_ctx(|actor: &mut PollActor, _| actor.store.sorted(now))
        }
    }
}
