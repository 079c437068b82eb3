use intune_core::config::{AppConfig, LoadOptions};
use intune_db::{connect_with_settings, migrations};

use crate::commands::{current_thread_runtime, CommandResult};

pub fn run() -> CommandResult {
    run_with(LoadOptions::default())
}

pub fn run_with(options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let Some(uri) = config.session.resolve_uri() else {
        return CommandResult::success(
            "migrate",
            "session persistence disabled; nothing to migrate",
        );
    };

    let runtime = match current_thread_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &uri,
            config.session.max_connections,
            config.session.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => {
            CommandResult::success("migrate", format!("applied pending migrations to `{uri}`"))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
