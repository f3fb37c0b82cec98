mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use festival::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
