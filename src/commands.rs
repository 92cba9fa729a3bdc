use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::{
    analysis::AlertGeneration,
    db::Database,
    services::{PressureService, UploadRequest},
    settings::{AnalysisOverrides, SettingsStore},
};

const DB_FILE: &str = "graphene.sqlite3";
const SETTINGS_FILE: &str = "settings.json";

/// Pressure-mat session ingestion, heatmaps, trends and alerts
#[derive(Parser, Debug)]
#[command(name = "graphene", version)]
pub struct Cli {
    /// Directory holding the database, settings and stored sessions
    #[arg(
        long,
        global = true,
        env = "GRAPHENE_DATA_DIR",
        default_value = "./graphene-data"
    )]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a CSV session for a subject
    Ingest {
        #[arg(long)]
        subject: String,

        /// CSV file with one sensor row per line
        #[arg(long)]
        file: PathBuf,

        #[arg(long)]
        uploaded_by: Option<String>,

        #[arg(long)]
        device: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Show one frame as a grid with its metrics
    Heatmap {
        /// Frame id
        #[arg(long, conflicts_with = "subject", required_unless_present = "subject")]
        frame: Option<String>,

        /// Latest frame of the subject's most recent upload
        #[arg(long)]
        subject: Option<String>,
    },

    /// Peak pressure and contact area over a subject's recent frames
    Trend {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        max_points: Option<usize>,
    },

    #[command(subcommand)]
    Alerts(AlertsCommand),

    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
pub enum AlertsCommand {
    /// List alerts, newest first
    List {
        #[arg(long)]
        subject: Option<String>,
    },

    /// Total and open alert counts
    Summary {
        #[arg(long)]
        subject: Option<String>,
    },

    /// Mark an open alert as acknowledged
    Ack { id: String },

    /// Close an alert
    Resolve {
        id: String,

        #[arg(long = "by")]
        resolved_by: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    Show,

    Set {
        #[arg(long)]
        alert_threshold: Option<u32>,

        #[arg(long)]
        critical_threshold: Option<u32>,

        #[arg(long)]
        activation_threshold: Option<u32>,

        /// on-ingest | on-first-view
        #[arg(long)]
        alert_generation: Option<AlertGeneration>,

        #[arg(long)]
        trend_max_points: Option<usize>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsView<T: Serialize> {
    path: String,
    analysis: T,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_settings(data_dir: &std::path::Path) -> Result<SettingsStore> {
    SettingsStore::new(data_dir.join(SETTINGS_FILE))
}

fn open_service(data_dir: &std::path::Path) -> Result<PressureService> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let settings = Arc::new(open_settings(data_dir)?);
    let db = Database::new(data_dir.join(DB_FILE))?;
    Ok(PressureService::new(db, settings, data_dir))
}

pub async fn execute(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir;

    match cli.command {
        Command::Settings(command) => settings_command(&data_dir, command),

        Command::Ingest {
            subject,
            file,
            uploaded_by,
            device,
            notes,
        } => {
            let service = open_service(&data_dir)?;
            let request = UploadRequest {
                subject_id: subject,
                uploaded_by,
                source_device: device,
                notes,
            };
            let receipt = service.upload_file(&request, &file).await?;
            print_json(&receipt)
        }

        Command::Heatmap { frame, subject } => {
            let service = open_service(&data_dir)?;
            let heatmap = match (frame, subject) {
                (Some(frame_id), _) => service.heatmap_for_frame(&frame_id).await?,
                (None, Some(subject_id)) => service.latest_heatmap(&subject_id).await?,
                (None, None) => bail!("either --frame or --subject is required"),
            };
            print_json(&heatmap)
        }

        Command::Trend {
            subject,
            max_points,
        } => {
            let service = open_service(&data_dir)?;
            let points = service.subject_trend(&subject, max_points).await?;
            print_json(&points)
        }

        Command::Alerts(command) => {
            let service = open_service(&data_dir)?;
            alerts_command(&service, command).await
        }
    }
}

async fn alerts_command(service: &PressureService, command: AlertsCommand) -> Result<()> {
    match command {
        AlertsCommand::List { subject } => {
            print_json(&service.list_alerts(subject.as_deref()).await?)
        }
        AlertsCommand::Summary { subject } => {
            print_json(&service.alert_summary(subject.as_deref()).await?)
        }
        AlertsCommand::Ack { id } => print_json(&service.acknowledge_alert(&id).await?),
        AlertsCommand::Resolve { id, resolved_by } => {
            print_json(&service.resolve_alert(&id, &resolved_by).await?)
        }
    }
}

fn settings_command(data_dir: &std::path::Path, command: SettingsCommand) -> Result<()> {
    let store = open_settings(data_dir)?;

    let analysis = match command {
        SettingsCommand::Show => store.analysis(),
        SettingsCommand::Set {
            alert_threshold,
            critical_threshold,
            activation_threshold,
            alert_generation,
            trend_max_points,
        } => {
            let overrides = AnalysisOverrides {
                alert_threshold,
                critical_threshold,
                activation_threshold,
                alert_generation,
                trend_max_points,
            };
            if overrides.is_empty() {
                bail!("nothing to update; pass at least one setting");
            }
            store.update_analysis(&overrides)?
        }
    };

    print_json(&SettingsView {
        path: store.path().display().to_string(),
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ingest_with_global_data_dir() {
        let cli = Cli::try_parse_from([
            "graphene",
            "ingest",
            "--subject",
            "patient-1",
            "--file",
            "session.csv",
            "--data-dir",
            "/tmp/graphene",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, PathBuf::from("/tmp/graphene"));
        match cli.command {
            Command::Ingest { subject, file, .. } => {
                assert_eq!(subject, "patient-1");
                assert_eq!(file, PathBuf::from("session.csv"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn heatmap_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["graphene", "heatmap"]).is_err());
        assert!(Cli::try_parse_from([
            "graphene", "heatmap", "--frame", "f-1", "--subject", "p-1"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["graphene", "heatmap", "--subject", "p-1"]).is_ok());
    }

    #[test]
    fn parses_alert_generation_mode() {
        let cli = Cli::try_parse_from([
            "graphene",
            "settings",
            "set",
            "--alert-generation",
            "on-first-view",
        ])
        .unwrap();

        match cli.command {
            Command::Settings(SettingsCommand::Set {
                alert_generation, ..
            }) => assert_eq!(alert_generation, Some(AlertGeneration::OnFirstView)),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "graphene",
            "settings",
            "set",
            "--alert-generation",
            "sometimes",
        ])
        .is_err());
    }

    #[test]
    fn resolve_takes_resolver() {
        let cli =
            Cli::try_parse_from(["graphene", "alerts", "resolve", "a-1", "--by", "nurse-4"])
                .unwrap();
        match cli.command {
            Command::Alerts(AlertsCommand::Resolve { id, resolved_by }) => {
                assert_eq!(id, "a-1");
                assert_eq!(resolved_by, "nurse-4");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn settings_set_persists_into_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "graphene",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "settings",
            "set",
            "--alert-threshold",
            "180",
        ])
        .unwrap();

        execute(cli).await.unwrap();
        let store = open_settings(dir.path()).unwrap();
        assert_eq!(store.analysis().alert_threshold, 180);
    }
}
