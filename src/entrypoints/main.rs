// === Entry point for the command line ===
#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> std::process::ExitCode {
    super::run::native_main().await
}
