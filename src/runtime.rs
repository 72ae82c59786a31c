// ABOUTME: Event loop driver: routes commands to the command table and other events to the bus
// ABOUTME: Each inbound event is handled in its own task so a slow handler never stalls the stream

use salon_core::commands::{bind_args, parse_message, ParseResult, ParsedCommand};
use salon_core::metrics;
use salon_core::{
    ChatPlatform, CommandContext, CommandError, DispatchOutcome, EventBus, EventStream,
    IncomingMessage, ModuleRegistry, Replier,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

/// Prefix shown in usage lines
const COMMAND_SIGIL: char = '!';

#[derive(Clone)]
pub struct Runtime {
    platform: Arc<dyn ChatPlatform>,
    bus: Arc<EventBus>,
    command_prefix: String,
}

impl Runtime {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        registry: Arc<ModuleRegistry>,
        command_prefix: impl Into<String>,
    ) -> Self {
        let bus = EventBus::new(registry, platform.bot_user_id());
        Self {
            platform,
            bus: Arc::new(bus),
            command_prefix: command_prefix.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        self.bus.registry()
    }

    /// Serve events until the transport's stream ends
    pub async fn run(&self, mut events: EventStream) {
        tracing::info!(
            modules = self.registry().module_count(),
            commands = self.registry().command_count(),
            "Event loop started"
        );
        while let Some(event) = events.next().await {
            self.spawn_event(event);
        }
        tracing::info!("Event stream ended");
    }

    pub fn spawn_event(&self, event: IncomingMessage) -> JoinHandle<()> {
        let runtime = self.clone();
        tokio::spawn(async move { runtime.handle_event(event).await })
    }

    pub async fn handle_event(&self, event: IncomingMessage) {
        if self.platform.is_self(&event.sender.id) {
            return;
        }

        match parse_message(&event.body, &self.command_prefix) {
            ParseResult::Command(cmd) => {
                if let Err(e) = self.handle_command(&event, &cmd).await {
                    tracing::error!(
                        command = %cmd.name,
                        channel = %event.channel_id,
                        error = %e,
                        "Failed to reply to command"
                    );
                }
            }
            ParseResult::Message(_) => match self.bus.dispatch(&event).await {
                Ok(DispatchOutcome::Delivered(n)) => {
                    tracing::trace!(event_id = %event.event_id, modules = n, "Event dispatched")
                }
                Ok(DispatchOutcome::IgnoredSelf) => {}
                Err(e) => tracing::error!(
                    module = %e.module,
                    event_id = %event.event_id,
                    channel = %event.channel_id,
                    error = %e.source,
                    "Behavior module failed"
                ),
            },
            ParseResult::Ignore => {}
        }
    }

    fn help_text(&self) -> String {
        let mut out = format!("Available commands:\n{}help - Show this list", COMMAND_SIGIL);
        for command in self.registry().commands() {
            out.push_str(&format!(
                "\n{} - {}",
                command.usage(COMMAND_SIGIL),
                command.description
            ));
        }
        out
    }

    /// Resolve, bind and run one command. Errors here are reply failures;
    /// handler failures are reported to the channel instead.
    pub async fn handle_command(
        &self,
        event: &IncomingMessage,
        cmd: &ParsedCommand,
    ) -> anyhow::Result<()> {
        let reply = Replier::new(Arc::clone(&self.platform), event.channel_id.clone());

        if cmd.name.is_empty() || cmd.name == "help" {
            metrics::record_command("help", "ok");
            return reply.say(self.help_text()).await;
        }

        let Some(command) = self.registry().command(&cmd.name) else {
            metrics::record_command("unknown", "unknown");
            let err = CommandError::Unknown(cmd.name.clone());
            tracing::debug!(error = %err, sender = %event.sender.id, "Unknown command");
            return reply
                .say(format!("Unknown command. {}", self.help_text()))
                .await;
        };

        let args = match bind_args(&command.params, &cmd.args) {
            Ok(args) => args,
            Err(e) => {
                metrics::record_command(&command.name, "invalid");
                return reply
                    .say(format!("❌ {}\nUsage: {}", e, command.usage(COMMAND_SIGIL)))
                    .await;
            }
        };

        tracing::info!(
            command = %command.name,
            sender = %event.sender.id,
            channel = %event.channel_id,
            "Running command"
        );
        if command.acknowledge {
            reply
                .say(format!("⏳ Running {}{}...", COMMAND_SIGIL, command.name))
                .await?;
        }

        let ctx = CommandContext {
            channel_id: event.channel_id.clone(),
            invoker: event.sender.clone(),
            reply: reply.clone(),
        };
        match command.invoke(args, ctx).await {
            Ok(()) => {
                metrics::record_command(&command.name, "ok");
                if command.acknowledge {
                    reply
                        .say(format!("✅ {}{} done.", COMMAND_SIGIL, command.name))
                        .await?;
                }
            }
            Err(e) => {
                metrics::record_command(&command.name, "error");
                tracing::error!(command = %command.name, error = ?e, "Command failed");
                reply
                    .say(format!(
                        "❌ {}{} failed. Check the bot logs for details.",
                        COMMAND_SIGIL, command.name
                    ))
                    .await?;
            }
        }
        Ok(())
    }
}
