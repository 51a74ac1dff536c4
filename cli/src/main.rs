//! `http-get`: perform one HTTP GET and print the response.
//!
//! The response goes to standard output. Failures go to standard error as
//! `<step>: <cause>`. A failed exchange exits with failure status; a shutdown
//! error after the response was printed does not change the exit status.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use http_get_core::{
    fetch_plain, fetch_tls, DnsResolver, HttpResponse, SessionError, SessionParams, TcpConnector,
    TlsContext, TrustError, Version,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "http-get",
    about = "Perform one HTTP GET and print the response",
    after_help = "Examples:\n    \
        http-get www.example.com 80 /\n    \
        http-get --tls www.example.com 443 / 1.0"
)]
struct Args {
    /// Secure the connection with TLS
    #[arg(long)]
    tls: bool,

    /// PEM file with the trusted root certificates (defaults to the bundled Mozilla roots)
    #[arg(long, value_name = "PEM", requires = "tls")]
    ca_file: Option<PathBuf>,

    host: String,

    /// Port number or service name
    port: String,

    target: String,

    /// HTTP version: 1.0 or 1.1 (default)
    #[arg(value_name = "VERSION")]
    http_version: Option<String>,
}

impl Args {
    fn params(&self) -> SessionParams {
        SessionParams::new(
            self.host.as_str(),
            self.port.as_str(),
            self.target.as_str(),
            Version::from_arg(self.http_version.as_deref()),
        )
    }
}

/// Logs to standard error, filtered by `RUST_LOG` (errors only by default).
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .without_time()
        .try_init()
        .ok();
}

fn load_trust(ca_file: Option<&Path>) -> Result<TlsContext, TrustError> {
    match ca_file {
        Some(path) => TlsContext::from_pem_file(path),
        None => Ok(TlsContext::with_webpki_roots()),
    }
}

fn print_response(response: HttpResponse) {
    let mut stdout = io::stdout().lock();
    let printed = response
        .write_to(&mut stdout)
        .and_then(|()| writeln!(stdout))
        .and_then(|()| stdout.flush());
    if let Err(err) = printed {
        eprintln!("output: {err}");
    }
}

/// Exit status for a finished exchange. Only a failure before the response
/// was delivered counts.
fn exit_status(outcome: &Result<(), SessionError>) -> u8 {
    match outcome {
        Ok(()) => 0,
        Err(err) if err.after_delivery() => 0,
        Err(_) => 1,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();
    let params = args.params();

    let tls = if args.tls {
        match load_trust(args.ca_file.as_deref()) {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                eprintln!("trust: {err}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();
    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(async {
        match &tls {
            Some(ctx) => {
                fetch_tls(&params, &DnsResolver, &TcpConnector, ctx, print_response).await
            }
            None => fetch_plain(&params, &DnsResolver, &TcpConnector, print_response).await,
        }
    });

    if let Err(err) = &outcome {
        eprintln!("{err}");
    }
    ExitCode::from(exit_status(&outcome))
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;

    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(argv)
    }

    #[test]
    fn three_positionals_default_to_http11() {
        let args = parse(&["http-get", "www.example.com", "80", "/"]).unwrap();
        let params = args.params();
        assert_eq!(params.host, "www.example.com");
        assert_eq!(params.port, "80");
        assert_eq!(params.target, "/");
        assert_eq!(params.version, Version::Http11);
        assert!(!args.tls);
    }

    #[test]
    fn version_positional_selects_http10() {
        let args = parse(&["http-get", "www.example.com", "80", "/", "1.0"]).unwrap();
        assert_eq!(args.params().version, Version::Http10);
    }

    #[test]
    fn other_version_text_falls_back_to_http11() {
        let args = parse(&["http-get", "www.example.com", "80", "/", "2"]).unwrap();
        assert_eq!(args.params().version, Version::Http11);
    }

    #[test]
    fn too_few_arguments_are_rejected() {
        for argv in [&["http-get"][..], &["http-get", "host"], &["http-get", "host", "80"]] {
            let err = parse(argv).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument, "{argv:?}");
        }
    }

    #[test]
    fn too_many_arguments_are_rejected() {
        let err = parse(&["http-get", "host", "80", "/", "1.1", "extra"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn tls_flag_and_ca_file() {
        let argv = ["http-get", "--tls", "--ca-file", "roots.pem", "host", "443", "/"];
        let args = parse(&argv).unwrap();
        assert!(args.tls);
        assert_eq!(args.ca_file.as_deref(), Some(Path::new("roots.pem")));
    }

    #[test]
    fn ca_file_requires_tls() {
        let err = parse(&["http-get", "--ca-file", "roots.pem", "host", "443", "/"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn missing_ca_file_is_trust_error() {
        let err = load_trust(Some(Path::new("/nonexistent/roots.pem"))).unwrap_err();
        assert!(matches!(err, TrustError::Io(_)));
    }

    #[test]
    fn failure_before_delivery_exits_with_failure() {
        let cause = || io::Error::new(io::ErrorKind::Other, "x");
        assert_eq!(exit_status(&Err(SessionError::Resolution(cause()))), 1);
        assert_eq!(exit_status(&Err(SessionError::Connection(cause()))), 1);
        assert_eq!(exit_status(&Err(SessionError::Handshake(cause()))), 1);
        assert_eq!(exit_status(&Err(SessionError::Read(cause()))), 1);
    }

    #[test]
    fn shutdown_error_after_delivery_exits_with_success() {
        let err = SessionError::Shutdown(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(exit_status(&Err(err)), 0);
        assert_eq!(exit_status(&Ok(())), 0);
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
