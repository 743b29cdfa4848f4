fn main() {
    if let Err(err) = detset::run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
