//! Command-line interface definitions and parsing

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Event index base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Relay WebSocket URL
    #[arg(long, global = true)]
    pub relay_url: Option<String>,

    /// Data directory for local projects and models
    #[arg(long, global = true)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check whether the event index is reachable
    Health,
    /// List subspaces
    Subspaces {
        /// Print the raw cards as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the proposals, votes and comments of a subspace
    Governance {
        /// Subspace id (0x...)
        sid: String,
        /// Only show this proposal
        #[arg(short, long)]
        proposal: Option<String>,
    },
    /// Create a new subspace
    CreateSubspace(CreateSubspaceArgs),
    /// Join a subspace
    Join {
        sid: String,
    },
    /// Post in a subspace, or comment on a proposal with --parent
    Post {
        sid: String,
        content: String,
        /// Event id of the proposal or post being answered
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Submit a proposal
    Propose {
        sid: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Vote on a proposal
    Vote {
        sid: String,
        /// Event id of the proposal
        proposal_id: String,
        /// yes, no or abstain
        choice: String,
        /// Optional comment carried as the vote content
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Invite an address into a subspace
    Invite {
        sid: String,
        address: String,
        #[arg(long)]
        rules: Option<String>,
    },
    /// Request a token mint for a subspace
    Mint(MintArgs),
    /// Show participation statistics for an address (defaults to your wallet)
    Profile {
        address: Option<String>,
    },
    /// Show the invitation graph of an address (defaults to your wallet)
    Graph {
        address: Option<String>,
        /// Walk raw invite events instead of the index summary
        #[arg(long)]
        from_events: bool,
    },
    /// Query indexed events
    Events(EventsArgs),
    /// Manage local projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage local fine-tuned model records
    #[command(subcommand)]
    Model(ModelCommand),
    /// Manage the signing wallet
    #[command(subcommand)]
    Wallet(WalletCommand),
    /// Recover the address that signed a message
    Recover {
        message: String,
        signature: String,
    },
    /// Stream new subspaces from the relay
    Watch {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Ask the model assistant a question
    Ask {
        query: String,
        /// Continue an earlier conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Print an example configuration file
    ExampleConfig,
}

#[derive(Args)]
pub struct CreateSubspaceArgs {
    #[arg(short, long)]
    pub name: String,
    /// Start from a predefined template (e.g. ModelDAO)
    #[arg(short, long)]
    pub template: Option<String>,
    /// Operations list, e.g. post=30300,vote=30302
    #[arg(long)]
    pub ops: Option<String>,
    #[arg(long)]
    pub rules: Option<String>,
    #[arg(short, long)]
    pub description: String,
    #[arg(long, default_value = "")]
    pub image_url: String,
}

#[derive(Args)]
pub struct MintArgs {
    pub sid: String,
    #[arg(long)]
    pub token_name: String,
    #[arg(long)]
    pub token_symbol: String,
    #[arg(long, default_value_t = 18)]
    pub token_decimals: u8,
    #[arg(long)]
    pub init_supply: u64,
    #[arg(long, default_value = "1:1")]
    pub drop_ratio: String,
}

#[derive(Args)]
pub struct EventsArgs {
    #[arg(short, long)]
    pub kind: Option<u16>,
    #[arg(short, long)]
    pub pubkey: Option<String>,
    #[arg(short, long)]
    pub sid: Option<String>,
    #[arg(long)]
    pub parent: Option<String>,
    #[arg(long)]
    pub proposal: Option<String>,
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    /// Create a project
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        description: String,
        #[arg(long)]
        image_url: Option<String>,
    },
    /// List projects
    List,
    /// Show one project and its models
    Show {
        id: u64,
    },
}

#[derive(Subcommand)]
pub enum ModelCommand {
    /// Record a fine-tuning job
    Create(ModelArgs),
    /// List model records
    List,
}

#[derive(Args)]
pub struct ModelArgs {
    #[arg(short, long)]
    pub name: String,
    #[arg(long)]
    pub image_url: String,
    #[arg(short, long)]
    pub description: String,
    /// llama2-7b, llama2-13b, chatglm2-6b or qwen-7b
    #[arg(long)]
    pub base_model: String,
    #[arg(long)]
    pub dataset: String,
    #[arg(long, default_value_t = 0.0001)]
    pub learning_rate: f64,
    #[arg(long, default_value_t = 3)]
    pub num_epochs: u32,
    #[arg(long, default_value_t = 8)]
    pub batch_size: u32,
    #[arg(long, default_value_t = 8)]
    pub lora_rank: u32,
    #[arg(long, default_value_t = 32)]
    pub lora_alpha: u32,
    /// Attach the model to this project
    #[arg(long)]
    pub project: Option<u64>,
}

#[derive(Subcommand)]
pub enum WalletCommand {
    /// Generate a new wallet key
    New {
        /// Store the key in the user configuration file
        #[arg(long)]
        save: bool,
    },
    /// Show the configured wallet address
    Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_vote() {
        let cli = Cli::try_parse_from([
            "causality", "vote", "0xabc", "proposal-id", "yes", "--comment", "agreed",
        ])
        .unwrap();
        match cli.command {
            Commands::Vote {
                sid,
                proposal_id,
                choice,
                comment,
            } => {
                assert_eq!(sid, "0xabc");
                assert_eq!(proposal_id, "proposal-id");
                assert_eq!(choice, "yes");
                assert_eq!(comment, "agreed");
            }
            _ => panic!("expected vote command"),
        }
    }

    #[test]
    fn test_model_defaults() {
        let cli = Cli::try_parse_from([
            "causality", "model", "create", "--name", "m", "--image-url", "https://x.io/m.png",
            "--description", "lora run", "--base-model", "qwen-7b", "--dataset", "dataset1",
            "--data-dir", "/tmp/c",
        ])
        .unwrap();
        assert_eq!(cli.data_dir.as_deref(), Some("/tmp/c"));
        match cli.command {
            Commands::Model(ModelCommand::Create(args)) => {
                assert_eq!(args.learning_rate, 0.0001);
                assert_eq!(args.num_epochs, 3);
                assert_eq!(args.batch_size, 8);
                assert_eq!(args.lora_rank, 8);
                assert_eq!(args.lora_alpha, 32);
                assert_eq!(args.project, None);
            }
            _ => panic!("expected model create"),
        }
    }

    #[test]
    fn test_descriptions_are_required() {
        assert!(Cli::try_parse_from(["causality", "project", "create", "--name", "p"]).is_err());
        assert!(Cli::try_parse_from([
            "causality", "create-subspace", "--name", "dao", "--template", "ModelDAO",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "causality", "project", "create", "--name", "p", "--description", "vision models",
        ])
        .is_ok());
    }
}
