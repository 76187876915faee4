use crate::actor::{
    spawn_actor_reserved, spawn_actor_with_shutdown, Actor, ActorHandle, Addr, Reserved,
};
use crate::system::{ActorSystem, ShutdownHandle};
use anyhow::Result;
use std::any::Any;
use std::collections::HashMap;

/// Spawns actors, tracks their tasks, and publishes typed addresses by name.
pub struct Builder {
    sys: ActorSystem,
    addrs: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            sys: ActorSystem::new(),
            addrs: HashMap::new(),
        }
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.sys.shutdown_handle()
    }

    /// Reserve an actor and publish its `Addr` under `name`.
    pub fn reserve<A>(&mut self, name: &str, mailbox: usize) -> Reserved<A>
    where
        A: Actor,
        Addr<A>: Send + Sync,
    {
        let r = spawn_actor_reserved::<A>(name, mailbox);
        self.addrs.insert(name.to_string(), Box::new(r.addr()));
        r
    }

    /// Start a previously reserved actor and track its task.
    pub fn start_reserved<A>(&mut self, r: Reserved<A>, actor: A) -> &mut Self
    where
        A: Actor,
    {
        let shutdown_rx = self.sys.shutdown_notifier();
        let h = r.start_with_shutdown(actor, Some(shutdown_rx));
        self.sys.track(async move { h.task.await? });
        self
    }

    /// Spawn an actor and publish its `Addr` under `name`.
    pub fn spawn<A>(&mut self, name: &str, mailbox: usize, actor: A) -> Addr<A>
    where
        A: Actor,
        Addr<A>: Send + Sync,
    {
        let shutdown_rx = self.sys.shutdown_notifier();
        let h: ActorHandle<A> = spawn_actor_with_shutdown(actor, mailbox, Some(shutdown_rx));
        let addr = h.addr.clone();
        self.sys.track(async move { h.task.await? });
        self.addrs.insert(name.to_string(), Box::new(addr.clone()));
        tracing::debug!(target: "quill-actors", %name, mailbox, "actor.spawned");
        addr
    }

    /// Typed address previously published under `name`.
    pub fn addr<A: Actor>(&self, name: &str) -> Option<Addr<A>> {
        self.addrs
            .get(name)
            .and_then(|b| b.downcast_ref::<Addr<A>>().cloned())
    }

    pub async fn graceful_shutdown(self) -> Result<()> {
        self.sys.graceful_shutdown().await
    }

    /// Block until CTRL-C or an explicit shutdown signal, then stop every actor.
    pub async fn run_until_shutdown(mut self) -> Result<()> {
        let mut shutdown_rx = self.sys.shutdown_notifier();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(target: "quill-actors", "shutdown.ctrl_c");
            }
            _ = shutdown_rx.recv() => {
                tracing::info!(target: "quill-actors", "shutdown.requested");
            }
        }
        // Drop published addresses so idle mailboxes close.
        self.addrs.clear();
        self.sys.graceful_shutdown().await
    }
}
