//! `playground [events|pipeline|config|all]`

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use shellforge_commands::{Command, CommandEnv, CommandInput};
use shellforge_core::Event;
use shellforge_executor::CommandInvocation;
use tracing::{info, warn};

use crate::plugin::{PLUGIN_NAME, TEST_EVENT};

const DEMOS: [(&str, &str); 4] = [
    ("events", "Operations, correlated events and the timeline"),
    ("pipeline", "Run echo through the command pipeline"),
    ("config", "Bump and persist the playground run counter"),
    ("all", "Every demo in turn"),
];

pub struct PlaygroundCommand {
    env: CommandEnv,
}

impl PlaygroundCommand {
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }

    fn overview(&self) {
        self.env.ui.info("Welcome to the shellforge playground.");
        let rows: Vec<Vec<String>> = DEMOS
            .iter()
            .map(|(name, about)| vec![format!("playground {}", name), about.to_string()])
            .collect();
        self.env.ui.table("Available demos", &["Command", "Description"], &rows);
    }

    fn demo_events(&self) -> Result<()> {
        let events = &self.env.events;
        let mut metadata = Map::new();
        metadata.insert("demo".into(), json!("events"));
        let op = events.start_operation("playground.demo", metadata);

        let payloads = [
            json!({ "message": "Hello from the playground" }),
            json!({ "message": "Testing events", "count": 1 }),
            json!({ "message": "Final test event", "status": "complete" }),
        ];
        let mut outcome = Ok(());
        for payload in payloads {
            let event = Event::new(TEST_EVENT, payload)
                .with_operation(op)
                .with_source(PLUGIN_NAME);
            if let Err(e) = events.emit(event) {
                outcome = Err(e);
                break;
            }
        }
        let (status, error) = match &outcome {
            Ok(()) => ("completed", None),
            Err(e) => ("failed", Some(e.to_string())),
        };
        events.complete_operation(op, status, error)?;
        outcome?;

        let rows: Vec<Vec<String>> = events
            .get_operation_timeline(op)
            .into_iter()
            .map(|s| {
                vec![
                    s.timestamp.format("%H:%M:%S%.3f").to_string(),
                    s.name,
                    s.payload.to_string(),
                ]
            })
            .collect();
        self.env.ui.table("Event timeline", &["Time", "Event", "Payload"], &rows);
        self.env.ui.success(&format!("Operation {} recorded {} events", op, rows.len()));
        Ok(())
    }

    async fn demo_pipeline(&self) -> Result<()> {
        let invocation = CommandInvocation::new("echo", vec!["hello from the playground".into()])
            .with_env("PLAYGROUND", "true")
            .with_option("demo", Value::from("pipeline"));
        self.env.ui.info("Executing echo through the pipeline...");
        let result = self.env.pipeline.execute(invocation).await;

        let show = |v: Option<String>| v.unwrap_or_else(|| "-".into());
        let rows = vec![
            vec!["Command ID".to_string(), result.id.to_string()],
            vec!["Status".to_string(), result.status.to_string()],
            vec!["Start".to_string(), result.start_time.to_rfc3339()],
            vec!["End".to_string(), show(result.end_time.map(|t| t.to_rfc3339()))],
            vec!["Exit code".to_string(), show(result.exit_code.map(|c| c.to_string()))],
            vec!["Output".to_string(), show(result.output.map(|o| o.trim_end().to_string()))],
            vec!["Error".to_string(), show(result.error)],
        ];
        self.env
            .ui
            .table("Pipeline result", &["Property", "Value"], &rows);
        Ok(())
    }

    async fn demo_config(&self, input: &CommandInput) -> Result<()> {
        let settings = &self.env.settings;
        let runs = settings.get_or("playground.runs", 0u64) + 1;
        settings.set("playground.runs", runs)?;
        settings.set("playground.last_run", Utc::now().to_rfc3339())?;
        if let Some(color) = input.option_str("color") {
            settings.set("playground.favorite_color", color)?;
        }
        if let Err(e) = settings.save().await {
            warn!(error = %e, "[Playground] Could not persist settings");
            self.env.ui.warning(&format!("Settings not saved: {}", e));
        }

        let get = |key: &str| {
            settings
                .get(&format!("playground.{}", key))
                .map(|v| match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "-".into())
        };
        let rows: Vec<Vec<String>> = ["runs", "last_run", "favorite_color"]
            .iter()
            .map(|key| vec![format!("playground.{}", key), get(key)])
            .collect();
        self.env.ui.table("Playground settings", &["Setting", "Value"], &rows);
        Ok(())
    }
}

#[async_trait]
impl Command for PlaygroundCommand {
    fn name(&self) -> &str {
        "playground"
    }

    fn summary(&self) -> &str {
        "Explore shellforge features"
    }

    fn usage(&self) -> String {
        "playground [events|pipeline|config [--color NAME]|all]".into()
    }

    async fn run(&self, input: &CommandInput) -> Result<()> {
        let demo = input.subcommand().unwrap_or_default();
        info!(demo = %demo, "[Playground] Running");
        match demo {
            "" => self.overview(),
            "events" => self.demo_events()?,
            "pipeline" => self.demo_pipeline().await?,
            "config" => self.demo_config(input).await?,
            "all" => {
                self.demo_events()?;
                self.demo_pipeline().await?;
                self.demo_config(input).await?;
            }
            other => bail!("unknown demo '{}'; try one of: events, pipeline, config, all", other),
        }
        Ok(())
    }
}
