use clap::Parser;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("LUMENS_LOG", "warn"))
        .format_timestamp_millis()
        .init();

    let args = lumens::cli::Args::parse();
    if let Err(err) = lumens::run(args) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
