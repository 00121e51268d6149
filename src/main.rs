//! amitree binary entry point.

fn main() {
    if let Err(e) = amitree::cli::run() {
        amitree::ui::output::error(format!("{:#}", e));
        std::process::exit(1);
    }
}
