use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match lt_worker::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
