mod actions;
mod args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    actions::run()
}
