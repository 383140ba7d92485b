use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    tokenlens::cli::main()
}
