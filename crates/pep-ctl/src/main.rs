//! pep-ctl — command-line client for the PEP authorization daemon.

use anyhow::Result;

mod cmd;

fn print_usage() {
    println!("Usage: pep-ctl <command>");
    println!();
    println!("Authorization");
    println!("  authorize --resource <id> --action <id> [options]");
    println!("                                  Ask the daemon for a decision");
    println!();
    println!("  Options:");
    println!("    --subject-dn <dn>             X.500 DN of the user");
    println!("    --fqan <fqan>                 VOMS FQAN, repeatable; first is primary");
    println!("    --certchain <file>            PEM certificate chain file");
    println!("    --endpoint <url>              Daemon endpoint, repeatable; overrides config");
    println!("    --timeout <secs>              Request timeout");
    println!();
    println!("Configuration");
    println!("  config init                     Write the default config file if missing");
    println!();
    println!("Exit codes: 0 Permit, 1 any other decision, 2 error.");
    println!();
    println!("Examples:");
    println!("  pep-ctl authorize --resource urn:example:cluster --action submit \\");
    println!("      --subject-dn 'CN=Alice,O=Example,C=CH' --fqan /vo/group/Role=prod");
    println!("  pep-ctl authorize --resource urn:example:cluster --action submit \\");
    println!("      --certchain ~/.globus/usercert.pem --endpoint https://pepd.example.org:8154/authz");
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity; diagnostics go to stderr so stdout
    // stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    match refs.as_slice() {
        ["authorize", rest @ ..] => cmd::authorize::cmd_authorize(rest).await,
        ["config", "init"] => cmd::config::cmd_config_init(),
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    }
}
