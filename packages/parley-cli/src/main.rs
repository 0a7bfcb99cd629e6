//! Parley CLI
//!
//! Encrypts and decrypts direct-message bodies from the terminal using the
//! same conversation keys as the app. Keys persist in a JSON file so a body
//! encrypted in one invocation decrypts in the next.
//!
//! ```text
//! parley conversation-id alice bob
//! parley encrypt alice_bob "hello 👋"
//! parley decrypt alice_bob <encryptedContent> <iv>
//! parley clear-keys
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use parley_core::{conversation_id, CoreConfig, EncryptedPayload, DEFAULT_KEY_PREFIX};
use serde_json::json;

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "parley", version, about = "Conversation message encryption")]
struct Args {
    /// JSON file holding persisted conversation keys
    #[arg(long, env = "PARLEY_STORE")]
    store: Option<PathBuf>,

    /// Prefix of persisted key entries
    #[arg(long, default_value = DEFAULT_KEY_PREFIX, env = "PARLEY_KEY_PREFIX")]
    key_prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the conversation id for two users
    ConversationId { user_a: String, user_b: String },

    /// Prepare the key for a conversation
    Init { conversation_id: String },

    /// Encrypt a message body
    Encrypt {
        conversation_id: String,
        plaintext: String,
    },

    /// Decrypt a message body
    Decrypt {
        conversation_id: String,
        encrypted_content: String,
        iv: String,
        /// Fail instead of printing the placeholder
        #[arg(long)]
        strict: bool,
    },

    /// Delete every persisted conversation key
    ClearKeys,
}

fn default_store_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("parley").join("keys.json"))
        .ok_or_else(|| eyre!("no data directory on this platform; pass --store"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info,parley_core=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = CoreConfig::with_store_path(match args.store {
        Some(path) => path,
        None => default_store_path()?,
    });
    config.key_prefix = args.key_prefix;
    tracing::debug!(store = ?config.store_path, "Using key store");

    let codec = config.build_codec();

    let output = match args.command {
        Command::ConversationId { user_a, user_b } => {
            json!({ "conversationId": conversation_id(&user_a, &user_b)? })
        }
        Command::Init { conversation_id } => {
            codec.initialize_for_conversation(&conversation_id).await?;
            json!({ "conversationId": conversation_id, "ready": true })
        }
        Command::Encrypt {
            conversation_id,
            plaintext,
        } => {
            let payload: EncryptedPayload = codec
                .encrypt_message(&plaintext, &conversation_id)
                .await
                .ok_or_else(|| eyre!("message could not be encrypted"))?;
            serde_json::to_value(payload)?
        }
        Command::Decrypt {
            conversation_id,
            encrypted_content,
            iv,
            strict,
        } => {
            let body = if strict {
                codec
                    .try_decrypt(&encrypted_content, &iv, &conversation_id)
                    .await?
            } else {
                codec
                    .decrypt_message(&encrypted_content, &iv, &conversation_id)
                    .await
            };
            json!({ "body": body })
        }
        Command::ClearKeys => {
            codec.clear_keys().await?;
            json!({ "cleared": true })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
