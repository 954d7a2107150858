use std::sync::Arc;

use clap::Args;
use mall_agent::ResolutionRuntime;
use mall_core::config::{AppConfig, LoadOptions};
use mall_core::errors::ResolutionError;
use mall_core::session::{InMemorySessionStore, SessionId};
use mall_db::{connect_with_settings, migrations, DemoMall, SqliteQueryExecutor};
use tracing::info;
use uuid::Uuid;

use crate::commands::{current_thread_runtime, CommandResult};

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[arg(long, help = "Free-text buyer request")]
    pub prompt: String,
    #[arg(long, help = "Session identifier (defaults to a fresh UUID)")]
    pub session: Option<String>,
    #[arg(long, help = "Answer with the store location instead of its stock")]
    pub guide: bool,
    #[arg(long, help = "Apply migrations and load the demo mall before resolving")]
    pub seed_demo: bool,
}

pub fn run(args: ResolveArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "resolve",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime("resolve") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        if args.seed_demo {
            migrations::run_pending(&pool)
                .await
                .map_err(|error| ("migration", error.to_string(), 5u8))?;
            DemoMall::seed(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        }

        let resolution = ResolutionRuntime::from_config(
            &config,
            Arc::new(SqliteQueryExecutor::new(pool.clone())),
            Arc::new(InMemorySessionStore::default()),
        )
        .map_err(|error| ("agent_init", format!("{error:#}"), 6u8))?;

        let session_id = session_id(args.session.as_deref());
        resolution.clear_session(&session_id).await;
        info!(
            event_name = "cli.resolve.started",
            session_id = %session_id,
            guide = args.guide,
            "resolving buyer request"
        );

        let answer = if args.guide {
            resolution.guide_answer(&args.prompt, &session_id).await
        } else {
            resolution.stock_context(&args.prompt, &session_id).await
        };
        resolution.end_session(&session_id).await;
        pool.close().await;

        answer.map_err(|error| no_store_failure(&error))
    });

    match result {
        Ok(text) => CommandResult::success("resolve", text),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("resolve", error_class, message, exit_code)
        }
    }
}

fn session_id(explicit: Option<&str>) -> SessionId {
    match explicit.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => SessionId::new(value),
        None => SessionId::new(Uuid::new_v4().to_string()),
    }
}

fn no_store_failure(error: &ResolutionError) -> (&'static str, String, u8) {
    match error {
        ResolutionError::NoStoreFound(_) => ("no_store_found", error.user_message(), 7),
    }
}

#[cfg(test)]
mod tests {
    use mall_core::errors::{NoStoreReason, ResolutionError};

    use super::{no_store_failure, session_id};

    #[test]
    fn blank_session_gets_generated_id() {
        assert_eq!(session_id(Some(" loja-a ")).0, "loja-a");
        assert_eq!(session_id(Some("  ")).0.len(), 36);
        assert_ne!(session_id(None), session_id(None));
    }

    #[test]
    fn missing_store_maps_to_dedicated_error_class() {
        let (class, message, code) =
            no_store_failure(&ResolutionError::NoStoreFound(NoStoreReason::NoValidHandle));

        assert_eq!(class, "no_store_found");
        assert_eq!(code, 7);
        assert_eq!(message, "Nenhum número de loja válido foi encontrado.");
    }
}
