use redis_init::cli::{run, EXIT_FATAL};

fn main() {
    let err = match run() {
        Ok(never) => match never {},
        Err(e) => e,
    };

    log::error!("{:#}", err);
    std::process::exit(EXIT_FATAL);
}
