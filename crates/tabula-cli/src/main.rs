use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = tabula_cli::cli().get_matches();
    match tabula_cli::run(&matches).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
