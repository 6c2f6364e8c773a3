use crate::managers::poll::Poll;
use crate::services::poll::{CreatePoll, ListPolls, PollActor, PollByName, RecordVote};
use crate::span::SpanMessage;
use actix::prelude::*;
use actix_web::error::ErrorInternalServerError;
use actix_web::{web, Error, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

#[derive(Serialize, Deserialize)]
pub struct PollListBody {
    #[serde(rename = "sPollList")]
    pub s_poll_list: Vec<Poll>,
}

#[derive(Serialize, Deserialize)]
pub struct PollBody {
    #[serde(rename = "sPoll")]
    pub s_poll: Poll,
}

#[instrument(skip(polls))]
async fn list_polls(polls: web::Data<Addr<PollActor>>) -> Result<HttpResponse, Error> {
    let sorted = polls
        .send(SpanMessage::new(ListPolls))
        .await
        .map_err(ErrorInternalServerError)?;
    Ok(HttpResponse::Ok().json(PollListBody {
        s_poll_list: sorted,
    }))
}

#[instrument(skip(body, polls))]
async fn add_poll(
    body: web::Json<Value>,
    polls: web::Data<Addr<PollActor>>,
) -> Result<HttpResponse, Error> {
    let created = polls
        .send(SpanMessage::new(CreatePoll(body.into_inner())))
        .await
        .map_err(ErrorInternalServerError)?;
    Ok(match created {
        Ok(poll) => HttpResponse::Ok().json(PollBody { s_poll: poll }),
        Err(reason) => HttpResponse::BadRequest().body(reason),
    })
}

#[instrument(skip(body, polls))]
async fn poll_from_name(
    body: web::Json<Value>,
    polls: web::Data<Addr<PollActor>>,
) -> Result<HttpResponse, Error> {
    let found = polls
        .send(SpanMessage::new(PollByName(body.into_inner())))
        .await
        .map_err(ErrorInternalServerError)?;
    Ok(match found {
        Ok(poll) => HttpResponse::Ok().json(PollBody { s_poll: poll }),
        Err(reason) => HttpResponse::BadRequest().body(reason),
    })
}

#[instrument(skip(body, polls))]
async fn record_vote(
    body: web::Json<Value>,
    polls: web::Data<Addr<PollActor>>,
) -> Result<HttpResponse, Error> {
    let recorded = polls
        .send(SpanMessage::new(RecordVote(body.into_inner())))
        .await
        .map_err(ErrorInternalServerError)?;
    Ok(match recorded {
        Ok(receipt) => HttpResponse::Ok().json(receipt),
        Err(reason) => HttpResponse::BadRequest().body(reason),
    })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    let polls = PollActor::new().start();
    cfg.data(polls)
        .service(web::resource("/api/getPollList").route(web::get().to(list_polls)))
        .service(web::resource("/api/add").route(web::post().to(add_poll)))
        .service(web::resource("/api/getPollFromName").route(web::post().to(poll_from_name)))
        .service(web::resource("/api/recordVote").route(web::post().to(record_vote)));
}
