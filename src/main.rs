// ┬─┐┌─┐┌─┐┌─┐┌─┐┬─┐┌─┐┬ ┬┌─┐┬─┐
// ├┬┘├┤ └─┐├┤ ├─┤├┬┘│  ├─┤├┤ ├┬┘
// ┴└─└─┘└─┘└─┘┴ ┴┴└─└─┘┴ ┴└─┘┴└─

// Finds the most prolific researchers on a topic via Google Scholar,
// detects the topic of a PDF with an LLM, and mails the ranked table.

// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

mod config;
mod connect;
mod error;
#[cfg(test)]
mod fakes;
mod http;
mod llm;
mod mail;
mod paper;
mod parse;
mod researchers;
mod search;
mod web;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Command, DEFAULT_PORT};
use mail::{parse_recipients, MailRequest};
use std::fs;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let connect = cli.settings.connect()?;

    match cli.command.unwrap_or(Command::Serve { port: DEFAULT_PORT }) {
        Command::Serve { port } => web::start_web_server(connect, port).await,
        Command::Find { topic, top_k } => {
            let lookup = connect.find_researchers(&topic.join(" "), top_k).await?;
            println!("Top {} researchers in {}:\n", lookup.top_k, lookup.topic);
            println!("{}", lookup.report);
        }
        Command::Analyze { path } => {
            let outcome = connect.analyze_pdf_path(path).await?;
            println!("{}", outcome.render());
        }
        Command::Send { to, subject, body_file } => {
            let body = match body_file {
                Some(path) => fs::read_to_string(&path)
                    .with_context(|| format!("Couldn't read body file {}", path.display()))?,
                None => String::new(),
            };
            let request = MailRequest {
                subject,
                body,
                recipients: parse_recipients(&to)?,
            };
            let report = connect.send_report(request).await?;
            println!("{}", report.message());
        }
    }
    Ok(())
}
