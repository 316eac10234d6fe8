use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// One interpretation of the configured channel identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelQuery {
    /// `@name`, synthesised from a bare alphanumeric identifier.
    Username(String),
    /// The identifier exactly as configured.
    Literal(String),
    /// The identifier parsed as a numeric chat id.
    Id(i64),
}

impl std::fmt::Display for ChannelQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelQuery::Username(name) => write!(f, "username {name}"),
            ChannelQuery::Literal(raw) => write!(f, "literal {raw:?}"),
            ChannelQuery::Id(id) => write!(f, "id {id}"),
        }
    }
}

/// A resolved source chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub id: i64,
    pub title: Option<String>,
}

impl ChannelHandle {
    pub fn display_name(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Looks up chats on the source platform.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    /// `Ok(None)` when the platform does not know the chat under this
    /// interpretation; `Err` only for failures that make further attempts pointless.
    async fn lookup(&self, query: &ChannelQuery) -> Result<Option<ChannelHandle>>;
}

/// Interpretations to try, in order.
pub fn candidates(raw: &str) -> Vec<ChannelQuery> {
    let mut out = Vec::with_capacity(3);

    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        out.push(ChannelQuery::Username(format!("@{raw}")));
    }

    out.push(ChannelQuery::Literal(raw.to_string()));

    if let Ok(id) = raw.trim().parse::<i64>() {
        out.push(ChannelQuery::Id(id));
    }

    out
}

pub async fn resolve(directory: &dyn ChannelDirectory, raw: &str) -> Result<ChannelHandle> {
    if raw.trim().is_empty() {
        anyhow::bail!("No channel configured");
    }

    for query in candidates(raw) {
        match directory.lookup(&query).await? {
            Some(handle) => {
                info!("Resolved channel {} via {}", raw, query);
                return Ok(handle);
            }
            None => debug!("Channel not found by {}", query),
        }
    }

    anyhow::bail!("Could not resolve channel: {raw}")
}
