// These Clippy lints are disabled because this is a CLI binary, not a library:
// - print_stderr: the final error is reported on stderr.
// - exit: the build outcome is the process exit status.
#![allow(clippy::print_stderr, clippy::exit)]

fn main() {
    match regbuild_cli::cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
