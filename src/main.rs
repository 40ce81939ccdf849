#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless,
    clippy::unused_async,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::cloned_instead_of_copied
)]
#![cfg_attr(not(test), forbid(clippy::indexing_slicing))]
#![cfg_attr(not(test), forbid(clippy::string_slice))]
mod config;
pub(crate) mod controller;
pub(crate) mod error;
pub(crate) mod http;
pub(crate) mod rate_limiter;
pub(crate) mod relay;
pub(crate) mod store;
pub(crate) mod transport;
pub(crate) mod validator;

use config::Config;
use controller::{Settlement, StatusSink, SubmissionController};
use env_logger::Env;
use http::{proxy_router, run_server, store_router};
use rate_limiter::CooldownGate;
use relay::{ProxyState, StoreState};
use std::env;
use std::process;
use std::sync::Arc;
use store::SignupStore;
use transport::{HiddenChannelTransport, OpaquePostTransport, Transport};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Status sink for `submit` mode: messages go to the terminal, the
/// input-field signals have nothing to act on and are no-ops.
#[derive(Debug)]
struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn show_success(&self, message: &str) {
        println!("{message}");
    }
    fn show_error(&self, message: &str) {
        eprintln!("{message}");
    }
    fn clear_message(&self) {}
    fn set_loading(&self, loading: bool) {
        if loading {
            log::debug!("sending...");
        }
    }
    fn clear_input(&self) {}
    fn focus_input(&self) {}
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <config_file> <mode> [email]");
    eprintln!("  mode: proxy, store or submit <email>");
}

#[tokio::main]
async fn main() {
    // default to info level
    let env = Env::new().filter_or("RUST_LOG", "info");
    env_logger::Builder::from_env(env)
        // disable timestamps - automatically added by systemd
        .format_timestamp(None)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args
        .first()
        .cloned()
        .unwrap_or_else(|| "signup-relay".to_string());
    if args.len() < 3 {
        print_usage(&program);
        process::exit(1);
    }

    let Some(config_path) = args.get(1) else {
        unreachable!("args length checked above")
    };
    let Some(mode) = args.get(2) else {
        unreachable!("args length checked above")
    };

    if mode != "proxy" && mode != "store" && mode != "submit" {
        eprintln!("Error: mode must be 'proxy', 'store' or 'submit'");
        process::exit(1);
    }

    let config = match Config::from_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read config: {}", e);
            process::exit(1);
        }
    };

    match mode.as_str() {
        "proxy" => {
            let addr = format!("{}:{}", config.listen_addr, config.listen_port);
            let client = match reqwest::Client::builder()
                .timeout(config.upstream_timeout())
                .build()
            {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Failed to build HTTP client: {}", e);
                    process::exit(1);
                }
            };
            if config.upstream_api_key.is_none() {
                log::warn!("upstream_api_key is not set, all proxied requests will fail with 500");
            }
            let state = ProxyState {
                config: Arc::new(config),
                client,
            };
            log::debug!("Proxy relay listening on {addr}");

            if let Err(e) = run_server(&addr, proxy_router(state)).await {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        "store" => {
            let addr = format!("{}:{}", config.listen_addr, config.listen_port);
            let store = match SignupStore::open(&config.store_path) {
                Ok(s) => Arc::new(s),
                Err(e) => {
                    eprintln!("Failed to open signup store: {}", e);
                    process::exit(1);
                }
            };
            log::info!("signup store holds {} addresses", store.address_count());
            let state = StoreState {
                config: Arc::new(config),
                store,
            };
            log::debug!("Store relay listening on {addr}");

            if let Err(e) = run_server(&addr, store_router(state)).await {
                eprintln!("Server error: {}", e);
                process::exit(1);
            }
        }
        "submit" => {
            let Some(email) = args.get(3) else {
                print_usage(&program);
                process::exit(1);
            };
            let Some(endpoint) = config.endpoint_url.clone() else {
                eprintln!("Error: endpoint_url must be set for submit mode");
                process::exit(1);
            };

            let transport: Box<dyn Transport> = match config.transport.as_str() {
                "opaque" => Box::new(OpaquePostTransport::new(endpoint)),
                "hidden" => {
                    match HiddenChannelTransport::new(endpoint, config.hidden_channel_timeout()) {
                        Ok(t) => Box::new(t),
                        Err(e) => {
                            eprintln!("Failed to build transport: {}", e);
                            process::exit(1);
                        }
                    }
                }
                other => {
                    eprintln!("Error: unknown transport '{}', expected 'opaque' or 'hidden'", other);
                    process::exit(1);
                }
            };

            let gate = CooldownGate::new(config.cooldown_state_path.clone(), config.cooldown());
            let mut controller = SubmissionController::new(transport, gate, ConsoleSink);

            if controller.submit(email, "").await == Settlement::Error {
                process::exit(1);
            }
        }
        _ => unreachable!("mode checked above"),
    }
}
