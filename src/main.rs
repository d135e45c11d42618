//! Demandcast - Main Entry Point
//!
//! Retail demand analytics and forecasting from the command line.

use clap::Parser;
use demandcast::cli::{
    cmd_info, cmd_predict, cmd_preprocess, cmd_run, cmd_train, print_banner, show_help, Cli,
    Commands,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demandcast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run {
            data,
            target,
            output,
            test_fraction,
            seed,
            trials,
            cv_folds,
            models,
        }) => {
            cmd_run(
                &data,
                &target,
                &output,
                test_fraction,
                seed,
                trials,
                cv_folds,
                models.as_deref(),
            )?;
        }
        Some(Commands::Train {
            data,
            target,
            model,
            trials,
            cv_folds,
            test_fraction,
            seed,
            output,
        }) => {
            cmd_train(
                &data,
                &target,
                &model,
                trials,
                cv_folds,
                test_fraction,
                seed,
                output.as_deref(),
            )?;
        }
        Some(Commands::Predict {
            model,
            data,
            output,
        }) => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Some(Commands::Preprocess {
            data,
            output,
            target,
            scaler,
            imputation,
        }) => {
            cmd_preprocess(&data, &output, &target, &scaler, &imputation)?;
        }
        Some(Commands::Info { data }) => {
            cmd_info(&data)?;
        }
        None => {
            print_banner();
            show_help();
        }
    }

    Ok(())
}
