//! Minimal demo binary: connects to two already-listening TCP endpoints and
//! wires them together through the proxy engine. Accepting connections is
//! explicitly out of scope for the engine (spec.md §1); this binary is just
//! enough of a harness to drive it end to end, playing the same role the
//! teacher's `examples/manage_backends.rs` plays for the load balancer.

use std::net::TcpStream;
use std::os::fd::IntoRawFd;
use std::process::ExitCode;

use zproxy::{Descriptor, Options, OptionsBuilder, Proxy};

fn usage() -> ! {
    eprintln!("usage: zproxy-demo <listen-side-addr> <connect-side-addr> [--no-zstd] [--ring]");
    std::process::exit(2);
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let listen_addr = args.next().unwrap_or_else(|| usage());
    let connect_addr = args.next().unwrap_or_else(|| usage());

    let mut builder = OptionsBuilder::new();
    for flag in args {
        match flag.as_str() {
            "--no-zstd" => builder = builder.zstd_enabled(false),
            "--ring" => builder = builder.ring_enabled(true),
            other => {
                eprintln!("unrecognized flag: {other}");
                usage();
            }
        }
    }
    let options: Options = builder.build();

    tracing::info!(
        listen_addr = %listen_addr,
        connect_addr = %connect_addr,
        ring = options.ring.enabled,
        "connecting"
    );

    let listen = match TcpStream::connect(&listen_addr) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("failed to connect to {listen_addr}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let connect = match TcpStream::connect(&connect_addr) {
        Ok(stream) => stream,
        Err(err) => {
            eprintln!("failed to connect to {connect_addr}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let proxy = Proxy {
        listen: Descriptor::new(listen.into_raw_fd()),
        connect: Descriptor::new(connect.into_raw_fd()),
        options,
    };

    match zproxy::run(proxy) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, code = err.code(), "proxy run failed");
            ExitCode::FAILURE
        }
    }
}
