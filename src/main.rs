fn main() {
    if let Err(err) = workflow_canvas::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
