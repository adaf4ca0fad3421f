use std::io::BufRead;
use std::net::IpAddr;
use std::process::ExitCode;

use bindrev::LookupClient;
use clap::Parser;

/// Looks up the DNS name last observed for one or more IP addresses.
#[derive(Parser, Debug)]
#[command(name = "bindrev-client", version, about)]
struct Args {
    /// Host the lookup server is listening on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port the lookup server is listening on.
    #[arg(long, default_value_t = 8888)]
    port: u16,

    /// IP addresses to look up.
    #[arg(conflicts_with = "stdin")]
    ips: Vec<IpAddr>,

    /// Read one IP address per line from stdin instead of positional args.
    #[arg(long)]
    stdin: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    let mut client = match LookupClient::connect(addr.as_str()).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("bindrev-client: failed to connect to {addr}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let ips: Vec<IpAddr> = if args.stdin {
        let stdin = std::io::stdin();
        stdin
            .lock()
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| line.trim().parse().ok())
            .collect()
    } else {
        args.ips
    };

    let mut any_unknown = false;
    for ip in ips {
        match client.get(ip).await {
            Ok(Some(name)) => println!("{name}"),
            Ok(None) => {
                any_unknown = true;
                println!("unknown");
            }
            Err(err) => {
                eprintln!("bindrev-client: lookup for {ip} failed: {err}");
                return ExitCode::FAILURE;
            }
        }
    }

    if let Err(err) = client.close().await {
        eprintln!("bindrev-client: error closing connection: {err}");
        return ExitCode::FAILURE;
    }

    if !args.stdin && any_unknown {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
