mod cli;
mod import;
mod infra;
mod routes;
mod server;

use escala360::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
