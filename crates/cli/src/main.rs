use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cardwise_agents::{CancelToken, CardAgent, DispatchError};
use cardwise_core::{
    to_adaptive_card, CardPayload, ConversationContext, DispatchPolicy, ExtractedSlots,
    FormSubmission, TemplateId, TemplateRegistry, Utterance,
};
use cardwise_ml::CardMlStack;
use cardwise_observability::{init_tracing, AppMetrics};
use cardwise_providers::Provider;
use cardwise_storage::Store;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "cardwise")]
#[command(about = "Turns chat utterances into structured card payloads")]
struct Cli {
    /// Base URL of the live-data service. Sample data is used when unset.
    #[arg(long, env = "CARDWISE_PROVIDER_URL")]
    provider_url: Option<String>,

    /// SQLite URL for form definitions. Kept in memory when unset.
    #[arg(long, env = "CARDWISE_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "CARDWISE_PROVIDER_TIMEOUT_MS")]
    provider_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Dispatch {
        text: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Payload)]
        format: OutputFormat,
        #[arg(long, requires = "previous_slots")]
        previous_template: Option<String>,
        /// JSON object of the previous card's slots.
        #[arg(long, requires = "previous_template")]
        previous_slots: Option<String>,
    },
    Chat {
        #[arg(long, value_enum, default_value_t = OutputFormat::Payload)]
        format: OutputFormat,
    },
    Templates,
    SubmitForm {
        #[arg(long)]
        form_id: String,
        /// Field value as `field=value`. Repeatable.
        #[arg(long = "value")]
        values: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Payload,
    Adaptive,
}

type Agent = CardAgent<Provider, Store>;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("cardwise_cli");
    let cli = Cli::parse();

    let agent = build_agent(&cli).await?;

    match cli.command {
        Command::Dispatch {
            text,
            format,
            previous_template,
            previous_slots,
        } => {
            let mut utterance = Utterance::new(text);
            if let (Some(template), Some(slots)) = (previous_template, previous_slots) {
                utterance = utterance.with_context(parse_context(&template, &slots)?);
            }

            let payload = dispatch_interruptible(&agent, utterance).await?;
            print_payload(&payload, format)?;
        }
        Command::Chat { format } => run_chat(agent, format).await?,
        Command::Templates => {
            let listing = template_listing(agent.registry());
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::SubmitForm { form_id, values } => {
            let submission = FormSubmission {
                form_id,
                values: parse_values(&values)?,
            };
            let payload = agent.submit_form(submission).await?;
            print_payload(&payload, OutputFormat::Payload)?;
        }
    }

    Ok(())
}

async fn build_agent(cli: &Cli) -> Result<Agent> {
    let mut policy = DispatchPolicy::from_env();
    if let Some(millis) = cli.provider_timeout_ms.filter(|millis| *millis > 0) {
        policy.provider_timeout = std::time::Duration::from_millis(millis);
    }

    let registry = Arc::new(TemplateRegistry::standard().context("invalid template catalogue")?);
    let provider = Provider::from_url(cli.provider_url.as_deref(), policy.provider_timeout)?;
    let store = Store::from_url(cli.database_url.as_deref()).await?;

    Ok(CardAgent::new(
        registry,
        CardMlStack::load_default()?,
        policy,
        Arc::new(provider),
        Arc::new(store),
        AppMetrics::shared(),
    ))
}

async fn dispatch_interruptible(agent: &Agent, utterance: Utterance) -> Result<CardPayload> {
    let token = CancelToken::new();
    let watcher = token.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    let result = agent.dispatch_with_cancel(utterance, &token).await;
    interrupt.abort();
    Ok(result?)
}

async fn run_chat(agent: Agent, format: OutputFormat) -> Result<()> {
    let mut context: Option<ConversationContext> = None;

    println!("cardwise chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        let mut utterance = Utterance::new(message);
        if let Some(previous) = context.clone() {
            utterance = utterance.with_context(previous);
        }

        match dispatch_interruptible(&agent, utterance).await {
            Ok(payload) => {
                print_payload(&payload, format)?;
                context = ConversationContext::from_payload(&payload).or(context);
            }
            Err(err) if is_cancelled(&err) => println!("(cancelled)"),
            Err(err) => return Err(err),
        }
    }

    let snapshot = agent.metrics().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<DispatchError>(), Some(DispatchError::Cancelled))
}

fn print_payload(payload: &CardPayload, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Payload => serde_json::to_string_pretty(payload)?,
        OutputFormat::Adaptive => serde_json::to_string_pretty(&to_adaptive_card(payload))?,
    };
    println!("{rendered}");
    Ok(())
}

fn parse_context(template: &str, slots: &str) -> Result<ConversationContext> {
    let Some(previous_template_id) = TemplateId::parse(template) else {
        bail!("unknown template `{template}`");
    };
    let previous_slots: ExtractedSlots =
        serde_json::from_str(slots).context("--previous-slots must be a JSON object")?;

    Ok(ConversationContext {
        previous_template_id,
        previous_slots,
    })
}

fn parse_values(values: &[String]) -> Result<BTreeMap<String, String>> {
    values
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("expected field=value, got `{pair}`"))?;
            Ok((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateListing {
    template_id: &'static str,
    display_name: &'static str,
    slots: Vec<SlotListing>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotListing {
    name: &'static str,
    #[serde(rename = "type")]
    ty: &'static str,
    required: bool,
    live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<String>,
}

fn template_listing(registry: &TemplateRegistry) -> Vec<TemplateListing> {
    registry
        .all()
        .iter()
        .map(|definition| TemplateListing {
            template_id: definition.id.as_str(),
            display_name: definition.id.display_name(),
            slots: definition
                .slots
                .iter()
                .map(|spec| SlotListing {
                    name: spec.name,
                    ty: spec.ty.label(),
                    required: spec.required,
                    live: spec.is_live(),
                    default: spec.default.as_ref().map(|value| value.display()),
                })
                .collect(),
        })
        .collect()
}
