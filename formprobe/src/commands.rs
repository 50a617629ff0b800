use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("formprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("formprobe")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" "Show debug-level log events")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about(
                    "Crawl a site, collect its forms and fuzz them for SQL injection and \
                reflected XSS.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The base URL to scan")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Maximum depth for the rendered crawl (non-negative integer)")
                        .allow_hyphen_values(true)
                        .default_value("2"),
                )
                .arg(
                    arg!(-c --"concurrency" <NUM>)
                        .required(false)
                        .help("Maximum number of fuzz requests in flight at once")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request HTTP timeout")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"body-timeout" <SECONDS>)
                        .required(false)
                        .help("How long to wait for a rendered page's body")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"driver" <DRIVER>)
                        .required(false)
                        .help("Rendered session backend: http, or chrome (needs the headless feature)")
                        .value_parser(["http", "chrome"])
                        .default_value("http"),
                )
                .arg(
                    arg!(--"no-render")
                        .required(false)
                        .help("Only run the static crawl; no forms are collected or fuzzed")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Statically crawl a site and list every same-origin page reached.")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The URL to crawl")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request HTTP timeout")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
        .subcommand(command!("payloads").about("List the payloads sent to every form"))
}
