use std::borrow::Cow;
use std::time::Duration;

use indicatif::style::TemplateError;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Operation;
use crate::render::{ProgressRenderedText, ProgressRenderer};

#[derive(Debug)]
pub(crate) enum OrchestrationProgressMessage {
    PreFlightCheck,
    Creating(String),
    Created(String),
    Upgrading(String),
    UpToDate(String),
    Upgraded(String),
    Destroying(String),
    Destroyed(String),
    Success(Operation, String),
}

impl ProgressRenderedText for OrchestrationProgressMessage {
    fn msg(&self) -> String {
        use colored::*;

        match self {
            OrchestrationProgressMessage::PreFlightCheck => {
                format!("{}", "📝 Running pre-flight checks".bold())
            }
            OrchestrationProgressMessage::Creating(stage) => {
                format!("🛠️  {} {}", "Creating".bold(), stage)
            }
            OrchestrationProgressMessage::Created(stage) => {
                format!("{:>6} {} {}", "✅".bold().green(), stage, "created")
            }
            OrchestrationProgressMessage::Upgrading(stage) => {
                format!("🔁 {} {}", "Checking".bold(), stage)
            }
            OrchestrationProgressMessage::UpToDate(stage) => {
                format!("{:>6} {} {}", "✅".bold().green(), stage, "up to date")
            }
            OrchestrationProgressMessage::Upgraded(stage) => {
                format!("{:>6} {} {}", "⬆️".bold().green(), stage, "upgraded")
            }
            OrchestrationProgressMessage::Destroying(stage) => {
                format!("🗑️  {} {}", "Destroying".bold(), stage)
            }
            OrchestrationProgressMessage::Destroyed(stage) => {
                format!("{:>6} {} {}", "❌".bold().red(), stage, "destroyed")
            }
            OrchestrationProgressMessage::Success(operation, cluster) => {
                let done = match operation {
                    Operation::Create => "created",
                    Operation::Upgrade => "upgraded",
                    Operation::Destroy => "destroyed",
                };
                format!("🎯 {} {} {}", "Successfully".bold(), done, cluster.bold())
            }
        }
    }
}

fn create_spinning_indicator() -> Result<ProgressBar, TemplateError> {
    let pb = ProgressBar::new(1);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner}")?
            .tick_chars("/-\\|"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

#[derive(Debug)]
pub struct ProgressBarFactory {
    hide: bool,
    plain: ProgressRenderer,
}

impl ProgressBarFactory {
    pub fn new(hide: bool) -> Self {
        Self {
            hide,
            plain: Default::default(),
        }
    }

    /// create new progress bar
    pub fn create(&self) -> Result<ProgressRenderer, TemplateError> {
        if self.hide || std::env::var("CI").is_ok() {
            Ok(ProgressBar::hidden().into())
        } else {
            Ok(create_spinning_indicator()?.into())
        }
    }

    /// simple print
    pub fn println(&self, msg: impl Into<Cow<'static, str>>) {
        self.plain.println(msg);
    }
}
