//! Operator command line over the JSON-file store.
//!
//! Every command prints its result as pretty JSON on stdout. Rejections print the
//! error body (code, category, message, upgrade prompt) and exit non-zero.
//! `--print-metrics` dumps the counters the command touched to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use serde_json::{Value, json};

use crate::config::{CompletionProviderKind, ConfigArgs, EngineConfig};
use crate::domain::{
    ConversationId, JourneyNumber, ResourceId, SessionId, StepNumber, SubscriptionStatus,
    SubscriptionTier, UserId,
};
use crate::error::EngineError;
use crate::metrics::METRICS;
use crate::model::{
    ChatReply, ChatRequest, ConversationSummaryView, JourneyDetail, JourneyList,
    JourneySupportView, JourneyView, ResourceCompletionView, StatsView, StatusFilter,
    StepGuidanceView, StepUpdateView, UserView,
};
use crate::service::JourneyService;

#[derive(Parser, Debug)]
#[command(
    name = "journey-engine",
    about = "Journey progression and coaching engine for the RELEASE method",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Print the metrics recorded by this command to stderr (Prometheus text format)
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register and inspect users
    #[command(subcommand)]
    User(UserCommand),
    /// Start and move through journeys
    #[command(subcommand)]
    Journey(JourneyCommand),
    /// Record resource completions
    #[command(subcommand)]
    Resource(ResourceCommand),
    /// Aggregate stats for a user
    Stats {
        #[arg(long)]
        user: String,
    },
    /// Send one message to the coach
    Chat {
        #[arg(long)]
        user: String,
        #[arg(long, short)]
        message: String,
        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
    },
    /// Inspect coaching conversations
    #[command(subcommand)]
    Conversations(ConversationCommand),
    /// Static guidance for a step (1-7)
    Guidance { step: u8 },
    /// Step guidance for one of the user's journeys
    Support {
        #[arg(long)]
        user: String,
        #[arg(long)]
        journey: u32,
        #[arg(long)]
        step: u8,
    },
    /// Print JSON schemas of the request and response bodies
    Schema,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        billing_ref: Option<String>,
    },
    Show {
        #[arg(long)]
        user: String,
    },
    /// Find a user by billing customer reference
    Lookup {
        #[arg(long)]
        billing_ref: String,
    },
    SetTier {
        #[arg(long)]
        user: String,
        #[arg(long)]
        tier: SubscriptionTier,
        #[arg(long, default_value = "active")]
        status: SubscriptionStatus,
    },
}

#[derive(Subcommand, Debug)]
pub enum JourneyCommand {
    Start {
        #[arg(long)]
        user: String,
        /// Who or what the resentment is about
        #[arg(long)]
        description: String,
    },
    /// Navigate to a step, or mark it completed with --completed
    Step {
        #[arg(long)]
        user: String,
        #[arg(long)]
        journey: u32,
        #[arg(long)]
        step: u8,
        #[arg(long)]
        completed: bool,
    },
    Pause {
        #[arg(long)]
        user: String,
        #[arg(long)]
        journey: u32,
    },
    Resume {
        #[arg(long)]
        user: String,
        #[arg(long)]
        journey: u32,
    },
    List {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },
    Show {
        #[arg(long)]
        user: String,
        #[arg(long)]
        journey: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommand {
    Complete {
        #[arg(long)]
        user: String,
        #[arg(long)]
        resource: String,
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommand {
    List {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: Option<String>,
    },
    Show {
        #[arg(long)]
        user: String,
        id: String,
    },
    Delete {
        #[arg(long)]
        user: String,
        id: String,
    },
}

impl Command {
    /// Whether the command calls the completion provider.
    pub fn uses_completion(&self) -> bool {
        matches!(self, Command::Chat { .. })
    }
}

/// Parses and runs `cli`, printing the outcome.
pub async fn run(cli: Cli) -> Result<()> {
    let Cli {
        mut config,
        print_metrics,
        command,
    } = cli;

    let result = match command {
        Command::Schema => Ok(schemas()),
        command => {
            // Only chat reaches the coach, so other commands never need an API key.
            if !command.uses_completion() {
                config.completion_provider = Some(CompletionProviderKind::Unavailable);
            }
            let config = EngineConfig::from_args(config)?;
            let service = JourneyService::from_config(&config)?;
            execute(&service, command).await
        }
    };

    if print_metrics {
        eprint!("{}", METRICS.encode());
    }

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            println!("{}", serde_json::to_string_pretty(&e.to_response())?);
            anyhow::bail!("{} failed: {}", e.code(), e);
        }
    }
}

fn user_id(raw: &str) -> Result<UserId, EngineError> {
    Ok(UserId::new(raw)?)
}

fn journey_number(raw: u32) -> Result<JourneyNumber, EngineError> {
    Ok(JourneyNumber::new(raw)?)
}

fn step_number(raw: u8) -> Result<StepNumber, EngineError> {
    Ok(StepNumber::new(raw)?)
}

/// Runs one service-backed command and returns its JSON body.
pub async fn execute(service: &JourneyService, command: Command) -> Result<Value, EngineError> {
    let output = match command {
        Command::User(UserCommand::Add {
            user,
            name,
            billing_ref,
        }) => json!(
            service
                .register_user(&user_id(&user)?, &name, billing_ref.as_deref())
                .await?
        ),
        Command::User(UserCommand::Show { user }) => {
            json!(service.user_profile(&user_id(&user)?).await?)
        }
        Command::User(UserCommand::Lookup { billing_ref }) => {
            json!({ "user": service.user_by_billing_ref(&billing_ref).await? })
        }
        Command::User(UserCommand::SetTier { user, tier, status }) => json!(
            service
                .set_subscription(&user_id(&user)?, tier, status)
                .await?
        ),

        Command::Journey(JourneyCommand::Start { user, description }) => json!(
            service
                .start_journey(&user_id(&user)?, &description)
                .await?
        ),
        Command::Journey(JourneyCommand::Step {
            user,
            journey,
            step,
            completed,
        }) => json!(
            service
                .update_step(
                    &user_id(&user)?,
                    journey_number(journey)?,
                    step_number(step)?,
                    completed
                )
                .await?
        ),
        Command::Journey(JourneyCommand::Pause { user, journey }) => json!(
            service
                .pause_journey(&user_id(&user)?, journey_number(journey)?)
                .await?
        ),
        Command::Journey(JourneyCommand::Resume { user, journey }) => json!(
            service
                .resume_journey(&user_id(&user)?, journey_number(journey)?)
                .await?
        ),
        Command::Journey(JourneyCommand::List { user, status }) => {
            json!(service.list_journeys(&user_id(&user)?, status).await?)
        }
        Command::Journey(JourneyCommand::Show { user, journey }) => json!(
            service
                .get_journey(&user_id(&user)?, journey_number(journey)?)
                .await?
        ),

        Command::Resource(ResourceCommand::Complete {
            user,
            resource,
            name,
        }) => json!(
            service
                .complete_resource(&user_id(&user)?, ResourceId::new(resource)?, &name)
                .await?
        ),

        Command::Stats { user } => json!(service.stats(&user_id(&user)?).await?),

        Command::Chat {
            user,
            message,
            session,
        } => {
            let request = ChatRequest {
                user_id: user,
                message,
                session_id: session,
            };
            json!(service.send_chat(&request).await?)
        }

        Command::Conversations(ConversationCommand::List { user, session }) => {
            let session = session.map(SessionId::new).transpose()?;
            json!({
                "conversations": service.list_conversations(&user_id(&user)?, session).await?
            })
        }
        Command::Conversations(ConversationCommand::Show { user, id }) => json!({
            "conversation": service
                .get_conversation(&user_id(&user)?, &ConversationId::parse(id)?)
                .await?
        }),
        Command::Conversations(ConversationCommand::Delete { user, id }) => {
            let deleted = service
                .delete_conversation(&user_id(&user)?, &ConversationId::parse(id)?)
                .await?;
            json!({ "deleted": deleted })
        }

        Command::Guidance { step } => json!(service.step_guidance(step).await?),
        Command::Support {
            user,
            journey,
            step,
        } => json!({
            "guidance": service
                .journey_support(&user_id(&user)?, journey_number(journey)?, step_number(step)?)
                .await?
        }),

        Command::Schema => schemas(),
    };
    Ok(output)
}

fn schemas() -> Value {
    json!({
        "UserView": schema_for!(UserView),
        "JourneyView": schema_for!(JourneyView),
        "StepUpdateView": schema_for!(StepUpdateView),
        "JourneyList": schema_for!(JourneyList),
        "JourneyDetail": schema_for!(JourneyDetail),
        "ResourceCompletionView": schema_for!(ResourceCompletionView),
        "StatsView": schema_for!(StatsView),
        "ChatRequest": schema_for!(ChatRequest),
        "ChatReply": schema_for!(ChatReply),
        "ConversationSummaryView": schema_for!(ConversationSummaryView),
        "StepGuidanceView": schema_for!(StepGuidanceView),
        "JourneySupportView": schema_for!(JourneySupportView),
    })
}
