use dashmap::DashMap;
use futures::future::BoxFuture;
use serenity::model::id::GuildId;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    audio::player::{GuildPlayer, PlaybackAnnouncer, PlayerDefaults},
    sources::ExtractionGateway,
};

type PendingTeardowns = DashMap<GuildId, (u64, CancellationToken)>;

/// Mapa guild → reproductor. Crea cada reproductor la primera vez que se
/// pide y nunca devuelve dos instancias distintas para el mismo guild.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    pending_teardowns: Arc<PendingTeardowns>,
    next_teardown_id: AtomicU64,
    gateway: Arc<dyn ExtractionGateway>,
    announcer: Arc<dyn PlaybackAnnouncer>,
    defaults: PlayerDefaults,
}

impl PlayerRegistry {
    pub fn new(
        gateway: Arc<dyn ExtractionGateway>,
        announcer: Arc<dyn PlaybackAnnouncer>,
        defaults: PlayerDefaults,
    ) -> Self {
        Self {
            players: DashMap::new(),
            pending_teardowns: Arc::new(DashMap::new()),
            next_teardown_id: AtomicU64::new(1),
            gateway,
            announcer,
            defaults,
        }
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🎶 Nuevo reproductor para guild {}", guild_id);
                GuildPlayer::new(guild_id, self.gateway.clone(), self.announcer.clone(), self.defaults)
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Elimina el reproductor y cualquier desconexión pendiente del guild
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.cancel_teardown(guild_id);
        let removed = self.players.remove(&guild_id).map(|(_, player)| player);
        if removed.is_some() {
            info!("🧹 Reproductor de guild {} eliminado ({} activos)", guild_id, self.len());
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Programa `teardown` para dentro de `grace` salvo que se cancele antes.
    ///
    /// Devuelve `false` si ya había una desconexión pendiente para el guild;
    /// en ese caso se mantiene el plazo original.
    pub fn schedule_teardown<F>(&self, guild_id: GuildId, grace: Duration, teardown: F) -> bool
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        let id = self.next_teardown_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        match self.pending_teardowns.entry(guild_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => return false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert((id, token.clone()));
            }
        }

        info!(
            "⏳ Bot solo en el canal de guild {}, desconexión en {}",
            guild_id,
            humantime::format_duration(grace)
        );

        let pending = self.pending_teardowns.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Desconexión de guild {} cancelada", guild_id);
                }
                _ = tokio::time::sleep(grace) => {
                    // Sólo si nadie la canceló ni la reemplazó mientras tanto
                    if pending.remove_if(&guild_id, |_, (pending_id, _)| *pending_id == id).is_some() {
                        info!("👋 Tiempo de inactividad agotado en guild {}", guild_id);
                        teardown().await;
                    }
                }
            }
        });

        true
    }

    pub fn cancel_teardown(&self, guild_id: GuildId) -> bool {
        match self.pending_teardowns.remove(&guild_id) {
            Some((_, (_, token))) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_pending_teardown(&self, guild_id: GuildId) -> bool {
        self.pending_teardowns.contains_key(&guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::player::tests::{defaults, RecordingAnnouncer},
        sources::MockExtractionGateway,
    };
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    fn registry() -> PlayerRegistry {
        PlayerRegistry::new(
            Arc::new(MockExtractionGateway::new()),
            Arc::new(RecordingAnnouncer::default()),
            defaults(),
        )
    }

    fn counting_teardown(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> BoxFuture<'static, ()> + Send + 'static {
        let counter = counter.clone();
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[test]
    fn test_get_or_create_returns_same_player() {
        let registry = registry();
        let guild = GuildId::new(10);

        let first = registry.get_or_create(guild);
        let second = registry.get_or_create(guild);
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.get_or_create(GuildId::new(11));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_creates_fresh_player() {
        let registry = registry();
        let guild = GuildId::new(10);

        let first = registry.get_or_create(guild);
        assert!(registry.remove(guild).is_some());
        assert!(registry.get(guild).is_none());

        let second = registry.get_or_create(guild);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_runs_after_grace() {
        let registry = registry();
        let guild = GuildId::new(10);
        let counter = Arc::new(AtomicUsize::new(0));

        assert!(registry.schedule_teardown(guild, Duration::from_secs(180), counting_teardown(&counter)));
        assert!(!registry.schedule_teardown(guild, Duration::from_secs(1), counting_teardown(&counter)));

        tokio::time::sleep(Duration::from_secs(179)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!registry.has_pending_teardown(guild));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_teardown_never_runs() {
        let registry = registry();
        let guild = GuildId::new(10);
        let counter = Arc::new(AtomicUsize::new(0));

        registry.schedule_teardown(guild, Duration::from_secs(180), counting_teardown(&counter));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(registry.cancel_teardown(guild));

        // Un nuevo plazo empieza de cero
        registry.schedule_teardown(guild, Duration::from_secs(180), counting_teardown(&counter));
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_cancels_pending_teardown() {
        let registry = registry();
        let guild = GuildId::new(10);
        let counter = Arc::new(AtomicUsize::new(0));

        registry.get_or_create(guild);
        registry.schedule_teardown(guild, Duration::from_secs(5), counting_teardown(&counter));
        registry.remove(guild);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(!registry.has_pending_teardown(guild));
    }
}
