use actix_web::{App, HttpServer};
use color_eyre::eyre::Report;
use dotenv::dotenv;
use polls_server::{log, server};
use std::env;
use tracing::info;

#[actix_rt::main]
async fn main() -> Result<(), Report> {
    dotenv().ok();
    log::setup()?;

    let bind_addr = env::var("POLLS_BIND").unwrap_or_else(|_| "127.0.0.1:8088".to_owned());

    info!("Starting poll server on {}", bind_addr);

    // One worker: requests run to completion against the store one at a
    // time, and the poll actor lives once per worker.
    HttpServer::new(|| App::new().configure(server::configure))
        .workers(1)
        .bind(&bind_addr)?
        .run()
        .await?;
    Ok(())
}
