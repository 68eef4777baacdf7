fn main() -> Result<(), Box<dyn std::error::Error>> {
    personachat::cli::main()
}
