fn main() {
    std::process::exit(mediadeck::cli::run());
}
