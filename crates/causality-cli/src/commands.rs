//! Command handlers for the Causality CLI

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use causality_api::{ApiError, EventQuery};
use causality_core::{
    build_proposals, count_votes, kind::KIND_INVITE, subspace_cards, GovernanceEvent,
    InviteGraph, LocalWallet, MessageSigner, MintParams, ParticipationStats, Proposal,
    ProposalContent, SubspaceCard, SubspaceTemplate, UnsignedEvent,
};

use crate::app::CausalityApp;
use crate::cli::{
    Cli, Commands, CreateSubspaceArgs, EventsArgs, MintArgs, ModelArgs, ModelCommand,
    ProjectCommand, WalletCommand,
};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::store::{Model, ModelForm, Project};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, mut app: CausalityApp) -> Result<()> {
        let result = Self::dispatch(cli.command, &mut app).await;
        if let Err(e) = app.shutdown().await {
            warn!("Failed to close relay connection: {}", e);
        }
        result
    }

    async fn dispatch(command: Commands, app: &mut CausalityApp) -> Result<()> {
        match command {
            Commands::Health => Self::handle_health_command(app).await,
            Commands::Subspaces { json } => Self::handle_subspaces_command(app, json).await,
            Commands::Governance { sid, proposal } => {
                Self::handle_governance_command(app, sid, proposal).await
            }
            Commands::CreateSubspace(args) => {
                Self::handle_create_subspace_command(app, args).await
            }
            Commands::Join { sid } => {
                let event = app.nostr().create_join_subspace(&sid)?;
                Self::publish(app, event, "Joined subspace").await
            }
            Commands::Post {
                sid,
                content,
                parent,
                content_type,
            } => Self::handle_post_command(app, sid, content, parent, content_type).await,
            Commands::Propose {
                sid,
                title,
                description,
            } => {
                let content = ProposalContent { title, description }.to_content();
                let event = app.nostr().create_propose(&sid, &content)?;
                Self::publish(app, event, "Proposal submitted").await
            }
            Commands::Vote {
                sid,
                proposal_id,
                choice,
                comment,
            } => {
                let event = app
                    .nostr()
                    .create_vote(&sid, &proposal_id, &choice, &comment)?;
                Self::publish(app, event, "Vote cast").await
            }
            Commands::Invite {
                sid,
                address,
                rules,
            } => {
                let event = app
                    .nostr()
                    .create_invite(&sid, &address, rules.as_deref(), "")?;
                Self::publish(app, event, "Invitation sent").await
            }
            Commands::Mint(args) => Self::handle_mint_command(app, args).await,
            Commands::Profile { address } => Self::handle_profile_command(app, address).await,
            Commands::Graph {
                address,
                from_events,
            } => Self::handle_graph_command(app, address, from_events).await,
            Commands::Events(args) => Self::handle_events_command(app, args).await,
            Commands::Project(command) => Self::handle_project_command(app, command),
            Commands::Model(command) => Self::handle_model_command(app, command),
            Commands::Wallet(command) => Self::handle_wallet_command(app, command),
            Commands::Recover { message, signature } => {
                let address = app.nostr().recover_address(&message, &signature)?;
                println!("{}", address);
                Ok(())
            }
            Commands::Watch { limit } => Self::handle_watch_command(app, limit).await,
            Commands::Ask {
                query,
                conversation,
            } => Self::handle_ask_command(app, query, conversation).await,
            Commands::ExampleConfig => {
                print!("{}", AppConfig::example_config());
                Ok(())
            }
        }
    }

    // ---- Reading ----

    async fn handle_health_command(app: &CausalityApp) -> Result<()> {
        let base_url = &app.config().api.base_url;
        if app.api().check_server_status().await {
            println!("Event index at {} is healthy", base_url);
            Ok(())
        } else {
            println!("Event index at {} is unavailable", base_url);
            Err(ApiError::ServerUnavailable.into())
        }
    }

    async fn handle_subspaces_command(app: &CausalityApp, json: bool) -> Result<()> {
        let events = app.api().get_all_events().await?;
        let cards = subspace_cards(&events);
        info!("Loaded {} subspaces from {} events", cards.len(), events.len());

        if json {
            return print_json(&cards);
        }
        if cards.is_empty() {
            println!("No subspaces yet");
        }
        for card in &cards {
            print_card(card);
        }
        Ok(())
    }

    async fn handle_governance_command(
        app: &CausalityApp,
        sid: String,
        proposal: Option<String>,
    ) -> Result<()> {
        let events = app
            .api()
            .query_events(&EventQuery::new().subspace(sid.clone()))
            .await?;
        let mut proposals = build_proposals(&events);

        if let Some(id) = proposal {
            proposals.retain(|p| p.id == id);
            if proposals.is_empty() {
                return Err(CliError::NotFound(format!("Proposal {}", id)));
            }
        }

        let overall = count_votes(&events);
        println!(
            "Subspace {}: {} proposals, {} votes ({} for, {} against, {} abstain)",
            sid,
            proposals.len(),
            overall.total() + overall.abstain,
            overall.for_votes,
            overall.against,
            overall.abstain
        );
        for proposal in &proposals {
            print_proposal(proposal);
        }
        Ok(())
    }

    async fn handle_profile_command(app: &CausalityApp, address: Option<String>) -> Result<()> {
        let address = app.address_or_signer(address)?;
        let stats = app.api().get_user_stats(&address).await?;
        let participation = ParticipationStats::from(&stats);

        println!("Address:          {}", address);
        println!("Subspaces:        {}", participation.total_keys);
        println!("  created:        {}", stats.created_subspaces.len());
        println!("  joined:         {}", stats.joined_subspaces.len());
        println!("Proposals:        {}", participation.proposal_count);
        println!("Votes:            {}", participation.vote_count);
        println!(
            "  yes / no:       {} / {}",
            stats.vote_stats.yes_votes, stats.vote_stats.no_votes
        );
        println!("Invites:          {}", participation.invite_count);
        Ok(())
    }

    async fn handle_graph_command(
        app: &CausalityApp,
        address: Option<String>,
        from_events: bool,
    ) -> Result<()> {
        let address = app.address_or_signer(address)?;
        let graph = if from_events {
            let events = app.api().get_events_by_kind(KIND_INVITE).await?;
            InviteGraph::from_events(&address, &events)
        } else {
            let invites = app.api().get_user_invites(&address).await?;
            InviteGraph::from_invites(&address, &invites)
        };
        print_json(&graph)
    }

    async fn handle_events_command(app: &CausalityApp, args: EventsArgs) -> Result<()> {
        let mut query = EventQuery::new();
        if let Some(kind) = args.kind {
            query = query.kind(kind);
        }
        if let Some(pubkey) = args.pubkey {
            query = query.pubkey(pubkey);
        }
        if let Some(sid) = args.sid {
            query = query.subspace(sid);
        }
        if let Some(parent) = args.parent {
            query = query.parent(parent);
        }
        if let Some(proposal) = args.proposal {
            query = query.proposal(proposal);
        }

        let events = if query == EventQuery::default() {
            app.api().get_all_events().await?
        } else {
            app.api().query_events(&query).await?
        };
        print_json(&events)
    }

    // ---- Publishing ----

    async fn publish(
        app: &mut CausalityApp,
        event: UnsignedEvent,
        done: &str,
    ) -> Result<()> {
        let published = app.publish(event).await?;
        println!("{}: {}", done, published.id);
        Ok(())
    }

    async fn handle_create_subspace_command(
        app: &mut CausalityApp,
        args: CreateSubspaceArgs,
    ) -> Result<()> {
        let template = match &args.template {
            Some(name) => Some(SubspaceTemplate::find(name).ok_or_else(|| {
                CliError::NotFound(format!("Template {}", name))
            })?),
            None => None,
        };

        let ops = args
            .ops
            .or_else(|| template.map(|t| t.ops.to_string()))
            .ok_or_else(|| CliError::validation("ops", "required without --template"))?;
        let rules = args
            .rules
            .or_else(|| template.map(|t| t.rules.to_string()))
            .ok_or_else(|| CliError::validation("rules", "required without --template"))?;
        let image_url = match (args.image_url.trim(), template) {
            ("", Some(template)) => template.image_url.to_string(),
            (url, _) => url.to_string(),
        };

        let event = app.nostr().create_subspace(
            &args.name,
            &ops,
            &rules,
            &args.description,
            &image_url,
        )?;
        let sid = event.tag("sid").unwrap_or_default().to_string();
        let published = app.publish(event).await?;

        println!("Created subspace {}", args.name);
        println!("  sid:   {}", sid);
        println!("  event: {}", published.id);
        Ok(())
    }

    async fn handle_post_command(
        app: &mut CausalityApp,
        sid: String,
        content: String,
        parent: Option<String>,
        content_type: Option<String>,
    ) -> Result<()> {
        let mut post = GovernanceEvent::post(&sid, &content)?;
        if let Some(parent) = &parent {
            post.set_parent(parent);
        }
        if let Some(content_type) = &content_type {
            post.set_content_type(content_type);
        }
        let event = post.to_unsigned();
        let done = if parent.is_some() { "Comment posted" } else { "Posted" };
        Self::publish(app, event, done).await
    }

    async fn handle_mint_command(app: &mut CausalityApp, args: MintArgs) -> Result<()> {
        let params = MintParams {
            token_name: args.token_name,
            token_symbol: args.token_symbol,
            token_decimals: args.token_decimals,
            init_supply: args.init_supply,
            drop_ratio: args.drop_ratio,
        };
        let event = app.nostr().create_mint(&args.sid, &params, "")?;
        Self::publish(app, event, "Mint requested").await
    }

    async fn handle_watch_command(app: &mut CausalityApp, limit: usize) -> Result<()> {
        let mut subscription = app.watch_subspaces(limit).await?;
        println!("Watching for subspaces (Ctrl+C to stop)");

        loop {
            tokio::select! {
                event = subscription.events.recv() => match event {
                    Some(event) => {
                        for card in subspace_cards(std::slice::from_ref(&event)) {
                            print_card(&card);
                        }
                    }
                    None => {
                        info!("Subscription {} closed by relay", subscription.id);
                        break;
                    }
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        Ok(())
    }

    async fn handle_ask_command(
        app: &CausalityApp,
        query: String,
        conversation: Option<String>,
    ) -> Result<()> {
        let mut conversation_id = String::new();
        app.assistant()
            .send_message(&query, conversation.as_deref(), |message| {
                if conversation_id.is_empty() && !message.conversation_id.is_empty() {
                    conversation_id = message.conversation_id.clone();
                }
                print!("{}", message.answer);
                let _ = std::io::stdout().flush();
            })
            .await?;
        println!();
        if !conversation_id.is_empty() {
            info!("Conversation: {}", conversation_id);
        }
        Ok(())
    }

    // ---- Local Records ----

    fn handle_project_command(app: &CausalityApp, command: ProjectCommand) -> Result<()> {
        let store = app.store();
        match command {
            ProjectCommand::Create {
                name,
                description,
                image_url,
            } => {
                let project = store.create_project(&name, &description, image_url.as_deref())?;
                println!("Created project {} ({})", project.name, project.id);
            }
            ProjectCommand::List => {
                let projects = store.list_projects()?;
                if projects.is_empty() {
                    println!("No projects yet");
                }
                for project in &projects {
                    print_project(project);
                }
            }
            ProjectCommand::Show { id } => {
                let project = store.get_project(id)?;
                print_project(&project);
                if project.models.is_empty() {
                    println!("  No models yet");
                }
                for model in &project.models {
                    print_model(model);
                }
            }
        }
        Ok(())
    }

    fn handle_model_command(app: &CausalityApp, command: ModelCommand) -> Result<()> {
        let store = app.store();
        match command {
            ModelCommand::Create(args) => {
                let model = store.create_model(model_form(args))?;
                println!("Recorded model {} ({})", model.model_name, model.id);
            }
            ModelCommand::List => {
                let models = store.list_models()?;
                if models.is_empty() {
                    println!("No models yet");
                }
                for model in &models {
                    print_model(model);
                }
            }
        }
        Ok(())
    }

    fn handle_wallet_command(app: &CausalityApp, command: WalletCommand) -> Result<()> {
        match command {
            WalletCommand::New { save } => {
                let wallet = LocalWallet::random();
                println!("Address: {}", wallet.address());

                if save {
                    let path = AppConfig::default_config_path()?;
                    let mut config = if path.exists() {
                        AppConfig::load_from_file(&path)?
                    } else {
                        AppConfig::default()
                    };
                    if config.wallet.secret_key.is_some() {
                        return Err(CliError::Config(format!(
                            "{} already holds a wallet key",
                            path.display()
                        )));
                    }
                    config.wallet.secret_key = Some(wallet.secret_hex());
                    config.save_to_file(&path)?;
                    println!("Saved key to {}", path.display());
                } else {
                    println!("Secret:  {}", wallet.secret_hex());
                }
            }
            WalletCommand::Address => {
                println!("{}", app.signer()?.address());
            }
        }
        Ok(())
    }
}

fn model_form(args: ModelArgs) -> ModelForm {
    ModelForm {
        model_name: args.name,
        image_url: args.image_url,
        description: args.description,
        base_model: args.base_model,
        dataset: args.dataset,
        learning_rate: args.learning_rate,
        num_epochs: args.num_epochs,
        batch_size: args.batch_size,
        lora_rank: args.lora_rank,
        lora_alpha: args.lora_alpha,
        project_id: args.project,
    }
}

// ----------------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------------

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_time(seconds: u64) -> String {
    DateTime::<Utc>::from_timestamp(seconds as i64, 0)
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn short(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn print_card(card: &SubspaceCard) {
    println!("{}  [{}]", card.name, card.id);
    println!("  {}", card.description);
    println!(
        "  {} proposals, {} posts, created {}",
        card.proposals,
        card.posts,
        format_time(card.created_at)
    );
}

fn print_proposal(proposal: &Proposal) {
    let votes = &proposal.votes;
    println!();
    println!("{}  [{}]", proposal.title, proposal.id);
    println!(
        "  by {} at {}",
        proposal.author,
        format_time(proposal.created_at)
    );
    if !proposal.content.is_empty() {
        println!("  {}", proposal.content);
    }
    println!(
        "  for {} ({}%), against {} ({}%), abstain {}",
        votes.for_votes,
        votes.for_percentage(),
        votes.against,
        votes.against_percentage(),
        votes.abstain
    );
    for voter in &proposal.voters {
        println!("    {} voted {}", voter.address, voter.vote);
    }
    for comment in &proposal.comments {
        println!(
            "    [{}] {}: {}",
            short(&comment.id),
            comment.author,
            comment.content
        );
    }
}

fn print_project(project: &Project) {
    println!("{}  [{}]", project.name, project.id);
    if !project.description.is_empty() {
        println!("  {}", project.description);
    }
    println!(
        "  {} models, created {}",
        project.models.len(),
        project.created_at
    );
}

fn print_model(model: &Model) {
    println!(
        "  {} [{}] {} on {}, lr {}, {} epochs, batch {}, LoRA r={} alpha={}",
        model.model_name,
        model.id,
        model.base_model,
        model.dataset,
        model.learning_rate,
        model.num_epochs,
        model.batch_size,
        model.lora_rank,
        model.lora_alpha
    );
}
