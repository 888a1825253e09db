fn main() {
    if let Err(err) = csvw_validate::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
