// ABOUTME: Stream watch module: announces configured Twitch streamers when they go live
// ABOUTME: Remembers who was live at the previous check so each stream is announced once

use crate::integrations::TwitchClient;
use anyhow::Result;
use salon_core::commands::CommandArgs;
use salon_core::{BehaviorModule, Command, CommandContext, Replier};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub struct StreamWatch {
    home: Replier,
    twitch: TwitchClient,
    streamers: Vec<String>,
    online: Mutex<HashSet<String>>,
}

impl StreamWatch {
    pub fn new(home: Replier, twitch: TwitchClient, streamers: Vec<String>) -> Self {
        Self {
            home,
            twitch,
            streamers,
            online: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the known-live set with `live`, returning who was not live before
    fn update_online(&self, live: HashSet<String>) -> Vec<String> {
        let mut online = self.online.lock().unwrap_or_else(|e| e.into_inner());
        let mut newly: Vec<String> = live.difference(&online).cloned().collect();
        newly.sort();
        *online = live;
        newly
    }

    pub async fn notify_online_streamers(&self) -> Result<Vec<String>> {
        let live = self.twitch.live_streams(&self.streamers).await?;
        let newly = self.update_online(live);

        for name in &newly {
            self.home
                .say(format!(
                    "{} is now live on Twitch! Check out the stream at https://twitch.tv/{}",
                    name, name
                ))
                .await?;
        }
        if !newly.is_empty() {
            tracing::info!(streamers = ?newly, "Announced live streamers");
        }
        Ok(newly)
    }
}

impl BehaviorModule for StreamWatch {
    fn name(&self) -> &str {
        "streams"
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        vec![Command::new(
            "streams",
            "Check whether watched streamers are live",
            move |_args: CommandArgs, _ctx: CommandContext| {
                let module = Arc::clone(&self);
                async move { module.notify_online_streamers().await.map(|_| ()) }
            },
        )
        .acknowledged()]
    }
}
