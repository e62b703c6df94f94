use clap::{Parser, Subcommand};
use map_widget::WidgetInstanceId;

mod context;
mod fs_host;
mod refresh;

use context::{AppContext, Config};

/// Drive map widget refreshes the way a home-screen widget host would.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh the given widgets once and print a summary.
    Update {
        #[arg(long = "widget-id", required = true)]
        widget_ids: Vec<i32>,
    },
    /// Refresh the given widgets periodically until interrupted.
    Watch {
        #[arg(long = "widget-id", required = true)]
        widget_ids: Vec<i32>,
        /// Overrides `interval_secs` from the configuration.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn to_instance_ids(ids: Vec<i32>) -> Vec<WidgetInstanceId> {
    ids.into_iter().map(WidgetInstanceId).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let context = widget_app::create_app_context::<AppContext, Config>()?;

    match cli.command {
        Command::Update { widget_ids } => {
            let response =
                refresh::refresh(&context, &to_instance_ids(widget_ids))
                    .await?;
            println!("{}", serde_json::to_string(&response)?);
        }
        Command::Watch {
            widget_ids,
            interval_secs,
        } => {
            let interval = interval_secs.map_or_else(
                || context.config.interval(),
                std::time::Duration::from_secs,
            );
            refresh::watch(&context, &to_instance_ids(widget_ids), interval)
                .await;
        }
    }

    Ok(())
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
    fn test_parses_repeated_widget_ids() {
        let cli = Cli::parse_from([
            "map_widget_host",
            "watch",
            "--widget-id",
            "3",
            "--widget-id",
            "8",
            "--interval-secs",
            "60",
        ]);

        match cli.command {
            Command::Watch {
                widget_ids,
                interval_secs,
            } => {
                assert_eq!(widget_ids, vec![3, 8]);
                assert_eq!(interval_secs, Some(60));
            }
            Command::Update { .. } => panic!("expected watch"),
        }
    }

    #[test]
    fn test_update_requires_a_widget_id() {
        assert!(Cli::try_parse_from(["map_widget_host", "update"]).is_err());
    }
}
