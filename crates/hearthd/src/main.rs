use std::process::ExitCode;

fn main() -> ExitCode {
    match hearthd::run_service() {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("hearthd: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}
