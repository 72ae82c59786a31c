// ABOUTME: Behavior module registry, command table, and the sequential event dispatch bus
// ABOUTME: Modules register once at startup; every inbound event visits them in order

use crate::commands::{CommandArgs, CommandParam};
use crate::error::{DispatchError, SetupError};
use crate::metrics;
use crate::reply::Replier;
use crate::traits::{ChatUser, IncomingMessage};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

// =============================================================================
// Behavior modules
// =============================================================================

/// A pluggable feature reacting to chat events and/or exposing commands.
///
/// Both capabilities are optional; a module that only runs scheduled jobs
/// keeps the defaults.
#[async_trait]
pub trait BehaviorModule: Send + Sync {
    /// Short identifier used in logs and errors
    fn name(&self) -> &str;

    /// Handle one inbound chat event
    async fn on_message(&self, _event: &IncomingMessage) -> Result<()> {
        Ok(())
    }

    /// Commands this module exposes; called once at registration
    fn commands(self: Arc<Self>) -> Vec<Command> {
        Vec::new()
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Where and by whom a command was invoked
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub channel_id: String,
    pub invoker: ChatUser,
    pub reply: Replier,
}

/// Invocation target of a command
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn invoke(&self, args: CommandArgs, ctx: CommandContext) -> Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandArgs, CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn invoke(&self, args: CommandArgs, ctx: CommandContext) -> Result<()> {
        (self)(args, ctx).await
    }
}

/// A remotely invocable command
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub description: String,
    pub params: Vec<CommandParam>,
    /// Whether the runtime posts start and completion notices around the handler
    pub acknowledge: bool,
    handler: Arc<dyn CommandHandler>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("params", &self.params)
            .field("acknowledge", &self.acknowledge)
            .finish()
    }
}

impl Command {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
            acknowledge: false,
            handler: Arc::new(handler),
        }
    }

    pub fn param(mut self, param: CommandParam) -> Self {
        self.params.push(param);
        self
    }

    /// Mark a long-running command: the invoker is told when it starts and ends
    pub fn acknowledged(mut self) -> Self {
        self.acknowledge = true;
        self
    }

    pub async fn invoke(&self, args: CommandArgs, ctx: CommandContext) -> Result<()> {
        self.handler.invoke(args, ctx).await
    }

    /// One-line usage, e.g. `!report <days>`
    pub fn usage(&self, prefix: char) -> String {
        let mut usage = format!("{}{}", prefix, self.name);
        for p in &self.params {
            if p.required {
                usage.push_str(&format!(" <{}>", p.name));
            } else {
                usage.push_str(&format!(" [{}]", p.name));
            }
        }
        usage
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Ordered set of behavior modules plus the process-wide command table
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn BehaviorModule>>,
    commands: BTreeMap<String, Command>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a module. Registering the same module twice delivers every event to it twice.
    pub fn register_module(&mut self, module: Arc<dyn BehaviorModule>) {
        if self.modules.iter().any(|m| Arc::ptr_eq(m, &module)) {
            tracing::debug!(module = module.name(), "Module registered more than once");
        }
        tracing::info!(module = module.name(), "Registering behavior module");
        self.modules.push(module);
    }

    /// Add a command; names must be unique across the process
    pub fn register_command(&mut self, command: Command) -> Result<(), SetupError> {
        if self.commands.contains_key(&command.name) {
            return Err(SetupError::DuplicateCommand(command.name));
        }
        tracing::info!(command = %command.name, "Registering command");
        self.commands.insert(command.name.clone(), command);
        Ok(())
    }

    /// Register a module together with the commands it exposes
    pub fn install(&mut self, module: Arc<dyn BehaviorModule>) -> Result<(), SetupError> {
        let commands = Arc::clone(&module).commands();
        self.register_module(module);
        for command in commands {
            self.register_command(command)?;
        }
        Ok(())
    }

    /// Modules in registration order
    pub fn modules(&self) -> &[Arc<dyn BehaviorModule>] {
        &self.modules
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Commands sorted by name
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}

// =============================================================================
// Event dispatch bus
// =============================================================================

/// What happened to one inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered to this many module handlers
    Delivered(usize),
    /// Sent by the bot itself; nobody saw it
    IgnoredSelf,
}

/// Delivers inbound events to every registered module, one after another
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<ModuleRegistry>,
    bot_user_id: String,
}

impl EventBus {
    pub fn new(registry: Arc<ModuleRegistry>, bot_user_id: impl Into<String>) -> Self {
        Self {
            registry,
            bot_user_id: bot_user_id.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Run each module's handler in registration order.
    ///
    /// A failing handler stops delivery of this event to the modules after it;
    /// the error is returned to the caller, not swallowed.
    pub async fn dispatch(&self, event: &IncomingMessage) -> Result<DispatchOutcome, DispatchError> {
        if event.sender.id == self.bot_user_id {
            return Ok(DispatchOutcome::IgnoredSelf);
        }

        let mut delivered = 0;
        for module in self.registry.modules() {
            if let Err(source) = module.on_message(event).await {
                metrics::record_dispatch_error(module.name());
                return Err(DispatchError {
                    module: module.name().to_string(),
                    source,
                });
            }
            delivered += 1;
        }

        metrics::record_event_dispatched();
        Ok(DispatchOutcome::Delivered(delivered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet(&'static str);

    #[async_trait]
    impl BehaviorModule for Quiet {
        fn name(&self) -> &str {
            self.0
        }
    }

    struct WithCommand(&'static str);

    #[async_trait]
    impl BehaviorModule for WithCommand {
        fn name(&self) -> &str {
            "with-command"
        }

        fn commands(self: Arc<Self>) -> Vec<Command> {
            vec![Command::new(self.0, "does things", |_args, _ctx| async {
                Ok(())
            })]
        }
    }

    #[test]
    fn test_register_command_rejects_duplicates() {
        let mut registry = ModuleRegistry::new();
        registry
            .register_command(Command::new("report", "first", |_a, _c| async { Ok(()) }))
            .unwrap();
        let err = registry
            .register_command(Command::new("report", "second", |_a, _c| async { Ok(()) }))
            .unwrap_err();
        assert!(matches!(err, SetupError::DuplicateCommand(ref n) if n == "report"));
        assert_eq!(registry.command("report").unwrap().description, "first");
    }

    #[test]
    fn test_install_registers_module_and_commands() {
        let mut registry = ModuleRegistry::new();
        registry.install(Arc::new(WithCommand("streams"))).unwrap();
        assert_eq!(registry.module_count(), 1);
        assert_eq!(registry.command_count(), 1);
        assert!(registry.command("streams").is_some());
    }

    #[test]
    fn test_install_conflicting_commands_fails() {
        let mut registry = ModuleRegistry::new();
        registry.install(Arc::new(WithCommand("streams"))).unwrap();
        let err = registry.install(Arc::new(WithCommand("streams"))).unwrap_err();
        assert!(matches!(err, SetupError::DuplicateCommand(_)));
    }

    #[test]
    fn test_duplicate_module_registration_is_allowed() {
        let mut registry = ModuleRegistry::new();
        let module: Arc<dyn BehaviorModule> = Arc::new(Quiet("twice"));
        registry.register_module(Arc::clone(&module));
        registry.register_module(module);
        assert_eq!(registry.module_count(), 2);
    }

    #[test]
    fn test_commands_sorted_by_name() {
        let mut registry = ModuleRegistry::new();
        for name in ["streams", "activities", "report"] {
            registry
                .register_command(Command::new(name, "", |_a, _c| async { Ok(()) }))
                .unwrap();
        }
        let names: Vec<_> = registry.commands().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["activities", "report", "streams"]);
    }

    #[test]
    fn test_command_usage() {
        use crate::commands::ParamKind;
        let cmd = Command::new("report", "Generate report", |_a, _c| async { Ok(()) })
            .param(CommandParam::required("days", "N days", ParamKind::Integer))
            .param(CommandParam::optional("channel", "Only one channel", ParamKind::Text));
        assert_eq!(cmd.usage('!'), "!report <days> [channel]");
    }

    #[test]
    fn test_modules_keep_registration_order() {
        let mut registry = ModuleRegistry::new();
        registry.register_module(Arc::new(Quiet("a")));
        registry.register_module(Arc::new(Quiet("b")));
        registry.register_module(Arc::new(Quiet("c")));
        let names: Vec<_> = registry.modules().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
