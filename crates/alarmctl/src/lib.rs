use anyhow::Context;
use clap::Parser;
use models::{DefaultConfig, Fragment, OverrideConfig};
use std::io::{Read, Write};
use std::path::PathBuf;

mod handle;

pub use handle::{Event, Response, Status};

/// Generate CloudWatch alarms for the resources of a CloudFormation
/// template fragment, as nested stacks of the fragment.
#[derive(Debug, Parser)]
#[clap(author, about, version)]
pub struct Cli {
    /// Log as JSON lines rather than human-readable text.
    #[clap(long, global = true)]
    pub log_json: bool,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Transform a template fragment and print the result as JSON.
    Transform(Transform),
    /// Handle a macro invocation event.
    ///
    /// The event is read as JSON from stdin, and its response is written
    /// to stdout. Failures to transform the event's fragment are reported
    /// within the response.
    Handle(Handle),
    /// Emit the JSON schema of a configuration document.
    JsonSchema(JsonSchema),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Transform {
    /// Path of the template fragment, as YAML or JSON.
    #[clap(long)]
    fragment: PathBuf,
    #[clap(flatten)]
    config: ConfigArgs,
    #[clap(flatten)]
    publish: PublishArgs,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Handle {
    #[clap(flatten)]
    config: ConfigArgs,
    #[clap(flatten)]
    publish: PublishArgs,
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct JsonSchema {
    /// Configuration document of the schema.
    #[clap(long, value_enum)]
    document: Document,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Document {
    Default,
    Override,
}

/// Locations of configuration documents.
#[derive(Debug, Default, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct ConfigArgs {
    /// Path of the default configuration, as YAML or JSON.
    /// If omitted, every alarm is disabled unless overridden.
    #[clap(long, env = "ALARMCTL_DEFAULT_CONFIG")]
    pub default_config: Option<PathBuf>,
    /// Path of the override configuration, as YAML or JSON.
    #[clap(long, env = "ALARMCTL_OVERRIDE_CONFIG")]
    pub override_config: Option<PathBuf>,
}

/// Where nested templates are published.
#[derive(Debug, Default, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct PublishArgs {
    /// Directory into which nested templates are written.
    #[clap(long, env = "ALARMCTL_PUBLISH_DIR", conflicts_with = "dry_run")]
    pub publish_dir: Option<PathBuf>,
    /// Don't write nested templates. They're logged at debug level instead.
    /// This is the default if no publish directory is given.
    #[clap(long)]
    pub dry_run: bool,
}

impl Cli {
    pub async fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Transform(transform) => transform.run().await,
            Command::Handle(handle) => handle.run().await,
            Command::JsonSchema(JsonSchema { document }) => {
                let schema = match document {
                    Document::Default => models::config::defaults_schema(),
                    Document::Override => models::config::overrides_schema(),
                };
                write_json(&schema)
            }
        }
    }
}

impl Transform {
    async fn run(&self) -> anyhow::Result<()> {
        let (defaults, overrides) = self.config.load()?;

        let content = std::fs::read(&self.fragment)
            .with_context(|| format!("failed to read {}", self.fragment.display()))?;
        let fragment = Fragment::from_yaml(&content)
            .with_context(|| format!("failed to parse fragment {}", self.fragment.display()))?;

        let out = self.publish.transform(&fragment, &defaults, &overrides).await?;
        write_json(&out)
    }
}

impl Handle {
    async fn run(&self) -> anyhow::Result<()> {
        let mut content = Vec::new();
        std::io::stdin()
            .read_to_end(&mut content)
            .context("failed to read invocation event from stdin")?;

        let event: Event =
            serde_json::from_slice(&content).context("failed to parse invocation event")?;

        let response = handle::handle(event, &self.config, &self.publish).await;
        write_json(&response)
    }
}

impl ConfigArgs {
    /// Load default and override configurations.
    /// Absent documents are equivalent to empty ones.
    pub fn load(&self) -> anyhow::Result<(DefaultConfig, OverrideConfig)> {
        let defaults = match &self.default_config {
            Some(path) => {
                let content = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                models::config::load_defaults(&path.display().to_string(), &content)?
            }
            None => {
                tracing::info!("no default configuration given; alarms are disabled unless overridden");
                DefaultConfig::default()
            }
        };

        let overrides = match &self.override_config {
            Some(path) => {
                let content = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                models::config::load_overrides(&path.display().to_string(), &content)?
            }
            None => {
                tracing::debug!("no override configuration given, skipped loading it");
                OverrideConfig::default()
            }
        };

        Ok((defaults, overrides))
    }
}

impl PublishArgs {
    /// Transform `fragment`, publishing its nested templates as directed.
    pub async fn transform(
        &self,
        fragment: &Fragment,
        defaults: &DefaultConfig,
        overrides: &OverrideConfig,
    ) -> anyhow::Result<Fragment> {
        match &self.publish_dir {
            Some(dir) if !self.dry_run => {
                let publisher = alarms::DirectoryPublisher::new(dir)?;
                Ok(alarms::transform(fragment, defaults, overrides, &publisher).await?)
            }
            _ => {
                let publisher = alarms::MemoryPublisher::new();
                let out = alarms::transform(fragment, defaults, overrides, &publisher).await?;

                for (index, template) in publisher.templates().iter().enumerate() {
                    tracing::debug!(
                        url = %format!("memory:///{index}"),
                        template = %serde_json::to_string(template)?,
                        "dry-run of nested template"
                    );
                }
                Ok(out)
            }
        }
    }
}

fn write_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
