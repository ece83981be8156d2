//! Command-line argument parsing for the deskhours daemon

/// Parse command line arguments
pub struct Args {
    pub once: bool,
    pub validate: bool,
    pub help: bool,
}

pub fn parse_args() -> Args {
    parse_from(std::env::args().collect())
}

/// Testable version: parse from an argument vector
pub fn parse_from(args: Vec<String>) -> Args {
    let mut result = Args {
        once: false,
        validate: false,
        help: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" => result.once = true,
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            _ => {}
        }
        i += 1;
    }

    result
}

pub fn print_help() {
    println!("Deskhours - business hours daemon for live support\n");
    println!("USAGE:");
    println!("    deskhours [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --once              Run a single reconcile pass and exit");
    println!("    --validate          Validate configuration and exit");
    println!("    --help, -h          Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    HOURS_FILE                 Optional JSON seed file of business hours/agents");
    println!("    RECONCILE_INTERVAL_SECS    Backstop reconcile cadence (default: 60)");
    println!("    HEALTH_PORT                Enable /health, /ready, /metrics on this port");
}
