fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = artpub::cli::Args::parse();
    artpub::cli::init_tracing(&args);
    if let Err(e) = artpub::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose > 0 {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
