mod cli;
mod modes;

fn main() {
    if let Err(e) = cli::run() {
        if e.downcast_ref::<modes::exec::ReportedError>().is_some() {
            std::process::exit(1);
        }
        eprintln!("{e:#}"); // pretty anyhow chain
        std::process::exit(1);
    }
}
