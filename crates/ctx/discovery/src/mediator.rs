//! Discovery mediator.
//!
//! Ties the registry, the lease manager and the subscription table together
//! and carries out each protocol operation against them. All outbound
//! traffic (lease-end handshakes, notifications) goes through the
//! independent dispatcher; completions come back through [`MediatorChannels`]
//! and are consumed by [`DiscoveryMediator::run`].
//!
//! Membership changes for one component (register, update, renew,
//! unregister, evict) hold that component's lock from their registry read
//! or write through the matching lease change, so a lease check and the
//! removal it guards are never split by another registration.

use std::future::Future;
use std::sync::Arc;

use ctx_lease::handshake;
use ctx_lease::{HandshakeOutcome, LeaseExpiry, LeaseManager, LeaseState, Resolution};
use ctx_query::QueryItem;
use ctx_registry::{ComponentRegistry, InMemoryComponentRegistry};
use ctx_transport::{
    Completion, CorrelationKey, Endpoint, IndependentDispatcher, Purpose, Transport,
};
use ctx_types::{
    Attributes, ComponentDescription, ComponentId, ComponentSummary, Lease, SubscriptionId,
    UpdateMode,
};
use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::MediatorConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::log::{DiscoveryLog, NoopLog};
use crate::notify;
use crate::paging::{CursorTable, QueryPage};
use crate::protocol::{LookupRequest, SubscribeRequest};
use crate::subscription::{DiscoveryCallback, Subscription, SubscriptionTable};

/// Where a component stands with the discoverer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    /// Not registered.
    Unknown,
    /// Registered with a running lease.
    Registered,
    /// Lease expired; waiting on the lease-end handshake.
    Renewing,
}

/// Receivers the mediator loop consumes.
pub struct MediatorChannels {
    pub expiries: mpsc::UnboundedReceiver<LeaseExpiry>,
    pub completions: mpsc::Receiver<Completion>,
}

/// The discovery service.
pub struct DiscoveryMediator {
    config: MediatorConfig,
    id: ComponentId,
    description: RwLock<ComponentDescription>,
    registry: Arc<dyn ComponentRegistry>,
    leases: LeaseManager,
    subscriptions: SubscriptionTable,
    dispatcher: IndependentDispatcher,
    cursors: CursorTable,
    log: Arc<dyn DiscoveryLog>,
    membership: DashMap<ComponentId, Arc<Mutex<()>>>,
}

impl DiscoveryMediator {
    pub fn new(
        config: MediatorConfig,
        registry: Arc<dyn ComponentRegistry>,
        transport: Arc<dyn Transport>,
        log: Arc<dyn DiscoveryLog>,
    ) -> (Self, MediatorChannels) {
        let (leases, expiries) = LeaseManager::new(config.lease.clone());
        let (dispatcher, completions) = IndependentDispatcher::new(transport, &config.dispatch);
        let description = config.description();

        let mediator = Self {
            id: description.id.clone(),
            description: RwLock::new(description),
            cursors: CursorTable::new(config.max_cursors),
            config,
            registry,
            leases,
            subscriptions: SubscriptionTable::new(),
            dispatcher,
            log,
            membership: DashMap::new(),
        };
        (
            mediator,
            MediatorChannels {
                expiries,
                completions,
            },
        )
    }

    /// Mediator over an in-memory registry with no discovery log.
    pub fn in_memory(
        config: MediatorConfig,
        transport: Arc<dyn Transport>,
    ) -> (Self, MediatorChannels) {
        Self::new(
            config,
            Arc::new(InMemoryComponentRegistry::new()),
            transport,
            Arc::new(NoopLog),
        )
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<dyn ComponentRegistry> {
        &self.registry
    }

    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    /// The discoverer's own description. It is not part of the searchable
    /// registry.
    pub async fn description(&self) -> ComponentDescription {
        self.description.read().await.clone()
    }

    /// Answer a multicast lookup.
    #[instrument(skip(self, request), fields(caller = %request.caller))]
    pub async fn lookup(&self, request: &LookupRequest) -> ComponentSummary {
        debug!(
            host = %request.host_address,
            port = request.port,
            "Discoverer lookup"
        );
        self.description.read().await.basic()
    }

    /// Register (or re-register) a component.
    ///
    /// A re-registration replaces the stored description and re-arms the
    /// lease; a handshake in flight for the old lease becomes stale.
    #[instrument(skip(self, description), fields(component = %description.id))]
    pub async fn register(
        &self,
        description: ComponentDescription,
        lease: Option<Lease>,
    ) -> DiscoveryResult<Lease> {
        let id = description.id.clone();
        let guard = self.lock_component(&id).await;
        let result = self.register_locked(description, lease).await;
        self.release_component(&id, guard);
        result
    }

    async fn register_locked(
        &self,
        description: ComponentDescription,
        lease: Option<Lease>,
    ) -> DiscoveryResult<Lease> {
        let previous = self.registry.add(description.clone()).await?;
        let active = self.leases.arm(&description.id, lease);

        if let Err(e) = self.log.record(&description).await {
            warn!(error = %e, "Failed to log registration");
        }

        info!(
            replaced = previous.is_some(),
            lease_ms = active.lease.duration.as_millis() as u64,
            "Component registered"
        );
        self.notify(DiscoveryCallback::NewComponent, &description)
            .await;
        Ok(active.lease)
    }

    /// Apply an attribute update, re-arming the lease when one is attached.
    #[instrument(skip(self, attributes))]
    pub async fn update(
        &self,
        id: &ComponentId,
        attributes: &Attributes,
        mode: UpdateMode,
        lease: Option<Lease>,
    ) -> DiscoveryResult<Option<Lease>> {
        let guard = self.lock_component(id).await;
        let result = self.update_locked(id, attributes, mode, lease).await;
        self.release_component(id, guard);
        result
    }

    async fn update_locked(
        &self,
        id: &ComponentId,
        attributes: &Attributes,
        mode: UpdateMode,
        lease: Option<Lease>,
    ) -> DiscoveryResult<Option<Lease>> {
        let updated = self.registry.update(id, attributes, mode).await?;
        let renewed = lease.map(|lease| self.leases.arm(id, Some(lease)).lease);

        if let Err(e) = self.log.record(&updated).await {
            warn!(error = %e, "Failed to log update");
        }

        debug!(attributes = attributes.len(), "Component updated");
        self.notify(DiscoveryCallback::UpdatedComponent, &updated)
            .await;
        Ok(renewed)
    }

    /// Remove a component at its own request.
    #[instrument(skip(self))]
    pub async fn unregister(&self, id: &ComponentId) -> DiscoveryResult<()> {
        let guard = self.lock_component(id).await;
        let result = self.unregister_locked(id).await;
        self.release_component(id, guard);
        result
    }

    async fn unregister_locked(&self, id: &ComponentId) -> DiscoveryResult<()> {
        let removed = self
            .registry
            .remove(id)
            .await?
            .ok_or_else(|| DiscoveryError::UnknownComponent(id.clone()))?;
        self.leases.cancel(id);

        info!("Component unregistered");
        self.departed(&removed).await;
        Ok(())
    }

    /// Remove a component whose lease ran out.
    ///
    /// A component that registered again after its lease ran out holds a
    /// fresh lease and is left alone.
    #[instrument(skip(self))]
    pub async fn evict(&self, id: &ComponentId, reason: &str) -> DiscoveryResult<()> {
        let guard = self.lock_component(id).await;
        let result = self.evict_locked(id).await;
        self.release_component(id, guard);
        result
    }

    async fn evict_locked(&self, id: &ComponentId) -> DiscoveryResult<()> {
        if self.leases.lease(id).is_some() {
            debug!("Component holds a newer lease, not evicting");
            return Ok(());
        }
        match self.registry.remove(id).await? {
            Some(removed) => {
                info!("Component evicted");
                self.departed(&removed).await;
            }
            None => debug!("Evicted component was already gone"),
        }
        Ok(())
    }

    async fn lock_component(&self, id: &ComponentId) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(&self.membership.entry(id.clone()).or_default());
        lock.lock_owned().await
    }

    /// Drop the guard, and the lock itself once nobody else waits on it.
    fn release_component(&self, id: &ComponentId, guard: OwnedMutexGuard<()>) {
        drop(guard);
        self.membership
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Removal notifications, subscription cascade and log cleanup shared
    /// by unregister and eviction.
    async fn departed(&self, removed: &ComponentDescription) {
        self.notify(DiscoveryCallback::RemovedComponent, removed)
            .await;

        let cascaded = self.subscriptions.remove_owned_by(&removed.id).await;
        if !cascaded.is_empty() {
            self.description
                .write()
                .await
                .subscribers
                .remove(removed.id.as_str());
        }

        if let Err(e) = self.log.forget(&removed.id).await {
            warn!(component = %removed.id, error = %e, "Failed to drop component from log");
        }
    }

    async fn notify(&self, callback: DiscoveryCallback, description: &ComponentDescription) {
        let matching = self.subscriptions.matching(callback, description).await;
        if !matching.is_empty() {
            let sent = notify::notify_all(&self.dispatcher, &matching, description);
            debug!(component = %description.id, %callback, sent, "Notifications dispatched");
        }
    }

    /// Run a query, returning every match as a basic summary ordered by id.
    #[instrument(skip(self, query))]
    pub async fn query(&self, query: Option<&QueryItem>) -> DiscoveryResult<Vec<ComponentSummary>> {
        let query = query.ok_or(DiscoveryError::EmptyQuery)?;
        query.validate()?;

        let found = self.registry.search(query).await?;
        debug!(query = query.kind(), found = found.len(), "Query evaluated");
        Ok(found.iter().map(ComponentDescription::basic).collect())
    }

    /// Run a query and return its first page. Without an explicit size the
    /// configured default applies.
    pub async fn query_page(
        &self,
        query: Option<&QueryItem>,
        page_size: Option<usize>,
    ) -> DiscoveryResult<QueryPage> {
        let results = self.query(query).await?;
        let page_size = page_size.unwrap_or(self.config.default_page_size);
        Ok(self.cursors.open(results, page_size))
    }

    /// Next page behind a cursor returned by [`DiscoveryMediator::query_page`].
    pub fn query_next(&self, cursor: &str) -> DiscoveryResult<QueryPage> {
        self.cursors.next(cursor)
    }

    /// Store a standing predicate. It is only evaluated against future
    /// events, never against components already registered.
    #[instrument(skip(self, request), fields(subscriber = %request.subscriber))]
    pub async fn subscribe(&self, request: SubscribeRequest) -> DiscoveryResult<SubscriptionId> {
        let callback = DiscoveryCallback::parse(&request.callback)?;
        let query = request.query.ok_or(DiscoveryError::EmptyQuery)?;
        query.validate()?;

        let subscription = Subscription {
            id: SubscriptionId::generate(),
            owner: request.subscriber.clone(),
            target: request.target,
            callback,
            full: request.full,
            query,
        };
        let id = subscription.id;
        self.subscriptions.insert(subscription).await;
        self.description
            .write()
            .await
            .subscribers
            .insert(request.subscriber.to_string());

        info!(subscription = %id, %callback, "Subscription added");
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, id: &SubscriptionId) -> DiscoveryResult<()> {
        let removed = self
            .subscriptions
            .remove(id)
            .await
            .ok_or(DiscoveryError::UnknownSubscriber(*id))?;

        if self.subscriptions.owned_by(&removed.owner).await.is_empty() {
            self.description
                .write()
                .await
                .subscribers
                .remove(removed.owner.as_str());
        }

        info!(owner = %removed.owner, "Subscription removed");
        Ok(())
    }

    /// Explicit lease renewal from a registered component.
    #[instrument(skip(self))]
    pub async fn renew(&self, id: &ComponentId, lease: Lease) -> DiscoveryResult<Lease> {
        let guard = self.lock_component(id).await;
        let result = match self.registry.contains(id).await {
            Ok(true) => {
                let active = self.leases.arm(id, Some(lease));
                info!(lease_ms = active.lease.duration.as_millis() as u64, "Lease renewed");
                Ok(active.lease)
            }
            Ok(false) => Err(DiscoveryError::UnknownComponent(id.clone())),
            Err(e) => Err(e.into()),
        };
        self.release_component(id, guard);
        result
    }

    pub fn state(&self, id: &ComponentId) -> RegistrationState {
        match self.leases.state(id) {
            None => RegistrationState::Unknown,
            Some(LeaseState::Active) => RegistrationState::Registered,
            Some(LeaseState::Handshaking) => RegistrationState::Renewing,
        }
    }

    /// A lease timer fired: start the lease-end handshake.
    #[instrument(skip(self))]
    pub async fn handle_expiry(&self, expiry: LeaseExpiry) {
        if !self.leases.begin_handshake(&expiry) {
            debug!("Ignoring stale lease expiry");
            return;
        }

        let description = match self.registry.get(&expiry.component).await {
            Ok(Some(description)) => description,
            Ok(None) => {
                warn!("Lease expired for a component missing from the registry");
                self.leases.cancel(&expiry.component);
                return;
            }
            Err(e) => {
                warn!(error = %e, "Registry lookup failed during lease expiry");
                self.conclude_handshake(
                    &expiry.component,
                    expiry.generation,
                    HandshakeOutcome::Failed(format!("registry lookup failed: {}", e)),
                )
                .await;
                return;
            }
        };

        self.dispatcher.dispatch_with_timeout(
            CorrelationKey::new(
                expiry.component.clone(),
                Purpose::LeaseEnd {
                    generation: expiry.generation,
                },
            ),
            Endpoint::of(&description),
            handshake::lease_end_request(&expiry.component),
            self.config.lease.handshake_timeout,
        );
    }

    /// Consume the outcome of an independent request.
    #[instrument(skip(self, completion), fields(key = %completion.key))]
    pub async fn handle_completion(&self, completion: Completion) {
        let Completion { key, result } = completion;
        match key.purpose {
            Purpose::LeaseEnd { generation } => {
                let outcome = HandshakeOutcome::from_reply(&key.component, &result);
                self.conclude_handshake(&key.component, generation, outcome)
                    .await;
            }
            Purpose::Notification { subscription } => {
                if let Err(e) = result {
                    warn!(%subscription, error = %e, "Notification delivery failed");
                }
            }
        }
    }

    async fn conclude_handshake(
        &self,
        component: &ComponentId,
        generation: u64,
        outcome: HandshakeOutcome,
    ) {
        match self
            .leases
            .resolve_handshake(component, generation, outcome)
        {
            Resolution::Renewed(active) => debug!(
                generation = active.generation,
                "Component kept its registration"
            ),
            Resolution::Evict { reason } => {
                if let Err(e) = self.evict(component, &reason).await {
                    warn!(error = %e, "Eviction failed");
                }
            }
            Resolution::Stale => {}
        }
    }

    /// Reinstate components from the discovery log.
    ///
    /// Every logged component is pinged concurrently. Those that answer are
    /// registered again with a fresh default lease; the rest are dropped
    /// from the log. Returns how many were reinstated.
    #[instrument(skip(self))]
    pub async fn restore_from_log(&self) -> DiscoveryResult<usize> {
        let logged = self.log.load().await?;
        if logged.is_empty() {
            return Ok(0);
        }

        let transport = self.dispatcher.transport().as_ref();
        let pings = logged.iter().map(|description| {
            let endpoint = Endpoint::of(description);
            async move {
                self.leases
                    .ping(transport, &description.id, &endpoint)
                    .await
            }
        });
        let answers = join_all(pings).await;

        let mut reinstated = 0;
        for (description, answer) in logged.into_iter().zip(answers) {
            match answer {
                Ok(()) => {
                    let id = description.id.clone();
                    let guard = self.lock_component(&id).await;
                    let added = self.registry.add(description).await;
                    if added.is_ok() {
                        self.leases.arm(&id, None);
                    }
                    self.release_component(&id, guard);
                    added?;
                    reinstated += 1;
                }
                Err(e) => {
                    debug!(
                        component = %description.id,
                        error = %e,
                        "Logged component did not answer"
                    );
                    if let Err(e) = self.log.forget(&description.id).await {
                        warn!(error = %e, "Failed to drop component from log");
                    }
                }
            }
        }

        info!(reinstated, "Restored components from discovery log");
        Ok(reinstated)
    }

    /// Drive lease expiries and request completions until `shutdown`
    /// resolves or both channels close.
    pub async fn run(&self, mut channels: MediatorChannels, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        info!(discoverer = %self.id, "Discovery mediator running");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Discovery mediator stopping");
                    break;
                }
                Some(expiry) = channels.expiries.recv() => self.handle_expiry(expiry).await,
                Some(completion) = channels.completions.recv() => {
                    self.handle_completion(completion).await
                }
                else => break,
            }
        }
    }
}
