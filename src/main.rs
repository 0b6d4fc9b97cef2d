fn main() {
    sysgraph::cli::run();
}
