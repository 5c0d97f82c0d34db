//! Command-line and environment configuration.

use crate::connect::{LookupSettings, ResearchConnect};
use crate::error::Result;
use crate::http::{http_client, DEFAULT_TIMEOUT};
use crate::llm::{CompletionService, GeminiCompletion, OllamaCompletion, DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_MODEL};
use crate::mail::{MailSettings, MailTransport, SmtpMailer, DEFAULT_SUBJECT};
use crate::researchers::RankingOptions;
use crate::search::{DuckDuckGoScholar, ScholarSearch, SearxngScholar, SerpApiScholar};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_PORT: u16 = 6601;

#[derive(Parser, Debug)]
#[command(author, version, about = "Research Connect: find researchers on a topic and mail the results", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the web interface (default)
    Serve {
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Print the ranked researcher table for a topic
    Find {
        #[arg(required = true, num_args = 1..)]
        topic: Vec<String>,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Extract the research topic of a PDF
    Analyze { path: PathBuf },
    /// Mail a text file to a list of recipients
    Send {
        /// Comma or space separated addresses; empty uses --default-recipients
        #[arg(long, default_value = "")]
        to: String,
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Serpapi,
    Searxng,
    Duckduckgo,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
    Ollama,
}

#[derive(Args, Debug, Clone)]
pub struct Settings {
    #[arg(long, env = "SCHOLAR_PROVIDER", value_enum, default_value = "serpapi")]
    pub provider: ProviderKind,

    #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
    pub serpapi_key: Option<String>,

    #[arg(long, env = "SEARXNG_INSTANCE", default_value = "https://searxng.site/")]
    pub searxng_instance: String,

    #[arg(long, default_value = "science")]
    pub category: String,

    #[arg(long, default_value = "google scholar,arxiv,crossref,semantic scholar")]
    pub engines: String,

    /// Result-count hint for the search provider
    #[arg(long, default_value_t = 30)]
    pub num_results: usize,

    #[arg(long, env = "LLM_BACKEND", value_enum, default_value = "gemini")]
    pub llm: LlmBackend,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Defaults to gemini-2.5-flash, or llama3.2:latest with --llm ollama
    #[arg(long, env = "LLM_MODEL")]
    pub model: Option<String>,

    #[arg(long, default_value = "http://localhost")]
    pub ollama_host: String,

    #[arg(long, default_value_t = 11434)]
    pub ollama_port: u16,

    /// Search the request as typed instead of letting the model pick topic and top-K
    #[arg(long, default_value_t = false)]
    pub no_planner: bool,

    #[arg(short = 'k', long, default_value_t = 3)]
    pub top_k: usize,

    #[arg(long, default_value_t = 3)]
    pub min_name_chars: usize,

    #[arg(long, default_value_t = 1)]
    pub min_occurrences: u32,

    #[arg(long, default_value_t = false)]
    pub require_profile_link: bool,

    #[arg(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "MAIL_SENDER")]
    pub sender: Option<String>,

    #[arg(long, env = "MAIL_APP_PASS", hide_env_values = true)]
    pub mail_password: Option<String>,

    #[arg(long, env = "DEFAULT_RECIPIENTS", value_delimiter = ',')]
    pub default_recipients: Vec<String>,

    #[arg(long, default_value = DEFAULT_SUBJECT)]
    pub default_subject: String,

    #[arg(long, env = "MAIL_SIGNATURE", default_value = "Research Connect")]
    pub signature: String,
}

impl Settings {
    pub fn ranking(&self) -> RankingOptions {
        RankingOptions {
            top_k: self.top_k,
            min_name_chars: self.min_name_chars,
            min_occurrences: self.min_occurrences,
            require_profile_link: self.require_profile_link,
        }
    }

    pub fn lookup(&self) -> LookupSettings {
        LookupSettings {
            ranking: self.ranking(),
            num_results: self.num_results,
            plan_with_model: !self.no_planner,
        }
    }

    pub fn mail(&self) -> MailSettings {
        MailSettings {
            default_recipients: self
                .default_recipients
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            default_subject: self.default_subject.clone(),
            signature: self.signature.clone(),
        }
    }

    pub fn model_name(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.llm {
            LlmBackend::Gemini => DEFAULT_GEMINI_MODEL.to_string(),
            LlmBackend::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
        })
    }

    pub fn build_search(&self, client: reqwest::Client) -> Arc<dyn ScholarSearch> {
        match self.provider {
            ProviderKind::Serpapi => Arc::new(SerpApiScholar::new(client, self.serpapi_key.clone())),
            ProviderKind::Searxng => Arc::new(SearxngScholar::new(
                client,
                self.searxng_instance.clone(),
                self.category.clone(),
                self.engines.clone(),
            )),
            ProviderKind::Duckduckgo => Arc::new(DuckDuckGoScholar::new(client)),
        }
    }

    pub fn build_model(&self, client: reqwest::Client) -> Arc<dyn CompletionService> {
        match self.llm {
            LlmBackend::Gemini => Arc::new(GeminiCompletion::new(
                client,
                self.gemini_api_key.clone(),
                self.model_name(),
            )),
            LlmBackend::Ollama => Arc::new(OllamaCompletion::new(
                &self.ollama_host,
                self.ollama_port,
                self.model_name(),
            )),
        }
    }

    pub fn build_mailer(&self) -> Result<Arc<dyn MailTransport>> {
        Ok(Arc::new(SmtpMailer::new(
            &self.smtp_host,
            self.smtp_port,
            self.sender.clone(),
            self.mail_password.clone(),
        )?))
    }

    /// Wires every collaborator. Missing credentials only surface when the
    /// feature that needs them is used.
    pub fn connect(&self) -> Result<ResearchConnect> {
        let client = http_client(DEFAULT_TIMEOUT)?;
        Ok(ResearchConnect::new(
            self.build_search(client.clone()),
            self.build_model(client),
            self.build_mailer()?,
            self.lookup(),
            self.mail(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_find_subcommand() {
        let cli = Cli::try_parse_from([
            "research_connect",
            "--provider",
            "searxng",
            "--min-occurrences",
            "2",
            "find",
            "graph",
            "neural",
            "networks",
            "-k",
            "5",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Find {
                topic: vec!["graph".into(), "neural".into(), "networks".into()],
                top_k: Some(5),
            })
        );
        assert_eq!(cli.settings.provider, ProviderKind::Searxng);
        assert_eq!(cli.settings.ranking().min_occurrences, 2);
        assert_eq!(cli.settings.ranking().min_name_chars, 3);
    }

    #[test]
    fn test_model_defaults_follow_backend() {
        let cli = Cli::try_parse_from(["research_connect", "--llm", "ollama", "--model", "mistral"]).unwrap();
        assert_eq!(cli.settings.model_name(), "mistral");
        let mut settings = cli.settings;
        settings.model = None;
        assert_eq!(settings.model_name(), DEFAULT_OLLAMA_MODEL);
        settings.llm = LlmBackend::Gemini;
        assert_eq!(settings.model_name(), DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_mail_settings_trim_recipients() {
        let cli = Cli::try_parse_from([
            "research_connect",
            "--default-recipients",
            "a@x.org, b@y.org,",
            "--signature",
            "Lab Bot",
        ])
        .unwrap();
        let mail = cli.settings.mail();
        assert_eq!(mail.default_recipients, vec!["a@x.org", "b@y.org"]);
        assert!(mail.fallback_body().contains("Lab Bot"));
    }
}
