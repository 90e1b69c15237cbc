//! The coordination engine.
//!
//! [`RfServer`] owns every state transition of the association and ISL
//! tables. It handles one message at a time; the dispatcher guarantees no
//! two messages are processed concurrently, which is what makes the
//! tables' last-writer-wins semantics safe.

mod routing;

use crate::config::RfServerConfig;
use crate::defaults::{is_rfvs, DefaultFlow};
use crate::error::{Result, ServerError};
use crate::static_config::StaticConfig;
use crate::store::Tables;
use rf_ipc::IpcService;
use rf_protocol::{
    DataPlaneMap, Envelope, Message, PortConfig, PortConfigOp, RouteMod,
};
use rf_table::{
    AssociationEntry, AssociationStatus, Field, IslConfigEntry, IslEndpoint, IslEntry, IslStatus,
    Query, Table, TableEntry,
};
use rf_types::{format_id, MacAddress};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The RouteFlow coordination engine.
pub struct RfServer {
    config: Arc<RfServerConfig>,
    static_config: Arc<StaticConfig>,
    ipc: Arc<dyn IpcService>,
    tables: Tables,
    op_timeout: Duration,
    /// Datapaths that already received their default flows.
    configured: HashSet<(u64, u64)>,
}

fn vm_port_query(vm_id: u64, vm_port: u32) -> rf_table::Result<Query> {
    Query::builder::<AssociationEntry>()
        .eq(Field::VmId, vm_id)
        .eq(Field::VmPort, vm_port)
        .build()
}

fn dp_port_query(ct_id: u64, dp_id: u64, dp_port: u32) -> rf_table::Result<Query> {
    Query::builder::<AssociationEntry>()
        .eq(Field::CtId, ct_id)
        .eq(Field::DpId, dp_id)
        .eq(Field::DpPort, dp_port)
        .build()
}

fn datapath_query<E: TableEntry>(ct_id: u64, dp_id: u64) -> rf_table::Result<Query> {
    Query::builder::<E>()
        .eq(Field::CtId, ct_id)
        .eq(Field::DpId, dp_id)
        .build()
}

fn isl_local_query(endpoint: &IslEndpoint) -> rf_table::Result<Query> {
    Query::builder::<IslEntry>()
        .eq(Field::CtId, endpoint.ct_id)
        .eq(Field::DpId, endpoint.dp_id)
        .eq(Field::DpPort, endpoint.dp_port)
        .build()
}

/// Idle-remote entries waiting for the endpoint whose peer is `peer`.
///
/// The engine itself never writes idle-remote entries. They only exist in
/// tables kept from an earlier run (`clear_tables_on_start = false`) or
/// written by another tool, and are completed or replaced on registration.
fn isl_pending_query(peer: &IslEndpoint) -> rf_table::Result<Query> {
    Query::builder::<IslEntry>()
        .unset(Field::CtId)
        .eq(Field::RemCt, peer.ct_id)
        .eq(Field::RemId, peer.dp_id)
        .eq(Field::RemPort, peer.dp_port)
        .build()
}

/// ISL entries whose remote side is on the given datapath.
fn isl_remote_query(ct_id: u64, dp_id: u64) -> rf_table::Result<Query> {
    Query::builder::<IslEntry>()
        .eq(Field::RemCt, ct_id)
        .eq(Field::RemId, dp_id)
        .build()
}

/// Tags a route modification with its controller and reduces it to what
/// the translator accepts.
fn prepare_route_mod(ct_id: u64, mut rm: RouteMod) -> rf_flow::Result<RouteMod> {
    rm.set_ct_id(ct_id);
    let (rm, flow) = rf_flow::normalize(rm)?;
    debug!(ct_id, %flow, "route mod translated");
    Ok(rm)
}

/// The switch port of an associated or active entry.
fn bound_port(entry: &AssociationEntry) -> Option<(u64, u64, u32)> {
    match entry.status() {
        Some(status) if status.is_bound() => Some((entry.ct_id?, entry.dp_id?, entry.dp_port?)),
        _ => None,
    }
}

impl RfServer {
    pub fn new(
        config: Arc<RfServerConfig>,
        static_config: Arc<StaticConfig>,
        ipc: Arc<dyn IpcService>,
        tables: Tables,
    ) -> Self {
        let op_timeout = config.op_timeout();
        Self {
            config,
            static_config,
            ipc,
            tables,
            op_timeout,
            configured: HashSet::new(),
        }
    }

    pub fn config(&self) -> &RfServerConfig {
        &self.config
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Prepares the tables before the first message is processed.
    ///
    /// Optionally clears the association and ISL tables, then publishes
    /// the static configuration rows.
    pub async fn initialize(&self) -> Result<()> {
        if self.config.server.clear_tables_on_start {
            self.bounded("table clear", self.tables.associations.clear()).await?;
            self.bounded("table clear", self.tables.isls.clear()).await?;
            info!("cleared association and ISL tables");
        }

        self.bounded("table clear", self.tables.config.clear()).await?;
        self.bounded("table clear", self.tables.isl_config.clear()).await?;
        for entry in self.static_config.entries() {
            self.upsert(self.tables.config.as_ref(), entry.clone()).await?;
        }
        for link in self.static_config.isl_entries() {
            self.upsert(self.tables.isl_config.as_ref(), link.clone()).await?;
        }
        info!(
            ports = self.static_config.entries().len(),
            links = self.static_config.isl_entries().len(),
            "published static config"
        );
        Ok(())
    }

    /// Applies one inbound message.
    pub async fn process(&mut self, envelope: Envelope) -> Result<()> {
        debug!(
            from = %envelope.from,
            channel = %envelope.channel,
            message = %envelope.message,
            "processing"
        );

        match envelope.message {
            Message::PortRegister(m) => self.register_vm_port(m.vm_id, m.vm_port, m.hwaddress).await,
            Message::DatapathPortRegister(m) => {
                self.register_dp_port(m.ct_id, m.dp_id, m.dp_port).await
            }
            Message::DatapathDown(m) => self.set_dp_down(m.ct_id, m.dp_id).await,
            Message::VirtualPlaneMap(m) => {
                self.map_port(m.vm_id, m.vm_port, m.vs_id, m.vs_port).await
            }
            Message::RouteMod(rm) => self.register_route_mod(rm).await,
            other @ (Message::PortConfig(_) | Message::DataPlaneMap(_)) => {
                debug!(kind = other.kind().as_str(), from = %envelope.from, "ignoring outbound message kind");
                Ok(())
            }
        }
    }

    /// A virtual router announced one of its ports.
    pub async fn register_vm_port(
        &mut self,
        vm_id: u64,
        vm_port: u32,
        eth_addr: MacAddress,
    ) -> Result<()> {
        let associations = self.tables.associations.clone();
        if let Some(entry) = self.find_one(associations.as_ref(), vm_port_query(vm_id, vm_port)?).await? {
            info!(vm_id = %format_id(vm_id), vm_port, status = ?entry.status(), "VM port already registered");
            return Ok(());
        }

        let idle = AssociationEntry::idle_vm(vm_id, vm_port, Some(eth_addr));
        let Some(config) = self.static_config.for_vm_port(vm_id, vm_port).cloned() else {
            info!(vm_id = %format_id(vm_id), vm_port, "no config for VM port, keeping it idle");
            self.upsert(associations.as_ref(), idle).await?;
            return Ok(());
        };

        let query = dp_port_query(config.ct_id, config.dp_id, config.dp_port)?;
        match self.find_one(associations.as_ref(), query).await? {
            Some(mut entry) if entry.status() == Some(AssociationStatus::IdleDpPort) => {
                entry.associate_vm(vm_id, vm_port, Some(eth_addr))?;
                let entry = self.upsert(associations.as_ref(), entry).await?;
                info!(%entry, "associated VM port with waiting datapath port");
                self.send_port_config(vm_id, vm_port, PortConfigOp::MapRequest).await
            }
            Some(entry) => {
                warn!(
                    vm_id = %format_id(vm_id),
                    vm_port,
                    %entry,
                    "configured datapath port is bound elsewhere, rejecting claim"
                );
                self.upsert(associations.as_ref(), idle).await?;
                Ok(())
            }
            None => {
                info!(%config, "VM port waiting for its datapath port");
                self.upsert(associations.as_ref(), idle).await?;
                Ok(())
            }
        }
    }

    /// A controller reported a switch port.
    pub async fn register_dp_port(&mut self, ct_id: u64, dp_id: u64, dp_port: u32) -> Result<()> {
        let overlay = is_rfvs(dp_id, self.config.datapath.rfvs_prefix);
        self.configure_datapath(ct_id, dp_id, overlay).await?;
        if overlay {
            debug!(ct_id, dp_id = %format_id(dp_id), dp_port, "overlay switch port, not tracked");
            return Ok(());
        }

        let links: Vec<IslConfigEntry> = self
            .static_config
            .isl_for_port(ct_id, dp_id, dp_port)
            .into_iter()
            .cloned()
            .collect();
        if !links.is_empty() {
            for link in &links {
                self.register_isl_port(link, ct_id, dp_id, dp_port).await?;
            }
            return Ok(());
        }

        let associations = self.tables.associations.clone();
        let query = dp_port_query(ct_id, dp_id, dp_port)?;
        if let Some(entry) = self.find_one(associations.as_ref(), query).await? {
            info!(%entry, status = ?entry.status(), "datapath port already registered");
            return Ok(());
        }

        let idle = AssociationEntry::idle_dp(ct_id, dp_id, dp_port);
        let Some(config) = self.static_config.for_dp_port(ct_id, dp_id, dp_port).cloned() else {
            info!(ct_id, dp_id = %format_id(dp_id), dp_port, "no config for datapath port, keeping it idle");
            self.upsert(associations.as_ref(), idle).await?;
            return Ok(());
        };

        let query = vm_port_query(config.vm_id, config.vm_port)?;
        match self.find_one(associations.as_ref(), query).await? {
            Some(mut entry) if entry.status() == Some(AssociationStatus::IdleVmPort) => {
                entry.associate_dp(ct_id, dp_id, dp_port)?;
                let entry = self.upsert(associations.as_ref(), entry).await?;
                info!(%entry, "associated datapath port with waiting VM port");
                self.send_port_config(config.vm_id, config.vm_port, PortConfigOp::MapRequest)
                    .await
            }
            Some(entry) => {
                warn!(
                    ct_id,
                    dp_id = %format_id(dp_id),
                    dp_port,
                    %entry,
                    "configured VM port is bound elsewhere, rejecting claim"
                );
                self.upsert(associations.as_ref(), idle).await?;
                Ok(())
            }
            None => {
                info!(%config, "datapath port waiting for its VM port");
                self.upsert(associations.as_ref(), idle).await?;
                Ok(())
            }
        }
    }

    /// Registers one end of a configured inter-switch link.
    async fn register_isl_port(
        &mut self,
        link: &IslConfigEntry,
        ct_id: u64,
        dp_id: u64,
        dp_port: u32,
    ) -> Result<()> {
        let Some((this_end, peer)) = link.oriented_from(ct_id, dp_id, dp_port) else {
            return Ok(());
        };
        let isls = self.tables.isls.clone();

        if let Some(entry) = self.find_one(isls.as_ref(), isl_local_query(&this_end)?).await? {
            info!(local = %this_end, status = ?entry.status(), "ISL port already registered");
            return Ok(());
        }

        let pending = self.find_one(isls.as_ref(), isl_pending_query(&peer)?).await?;
        let peer_entry = self.find_one(isls.as_ref(), isl_local_query(&peer)?).await?;

        let peer_linked = match peer_entry {
            Some(mut entry) => match entry.status() {
                Some(IslStatus::IdleLocal) => {
                    entry.associate(this_end)?;
                    self.upsert(isls.as_ref(), entry).await?;
                    true
                }
                Some(IslStatus::Active)
                    if entry.remote.is_some_and(|r| r.is_port(ct_id, dp_id, dp_port)) =>
                {
                    true
                }
                _ => {
                    warn!(local = %this_end, %peer, "ISL peer is linked elsewhere, rejecting claim");
                    false
                }
            },
            None => false,
        };

        let own = match (peer_linked, pending) {
            (true, Some(mut entry)) => {
                entry.vm_id = Some(link.vm_id);
                entry.associate(this_end)?;
                entry
            }
            (true, None) => IslEntry::active(Some(link.vm_id), this_end, peer),
            (false, pending) => {
                if let Some(stale) = pending {
                    self.delete(isls.as_ref(), &stale).await?;
                }
                IslEntry::idle_local(Some(link.vm_id), this_end)
            }
        };

        if peer_linked {
            info!(local = %this_end, remote = %peer, "ISL active");
        } else {
            info!(local = %this_end, remote = %peer, "ISL port waiting for its peer");
        }
        self.upsert(isls.as_ref(), own).await?;
        Ok(())
    }

    /// A controller lost a datapath.
    pub async fn set_dp_down(&mut self, ct_id: u64, dp_id: u64) -> Result<()> {
        let associations = self.tables.associations.clone();
        let isls = self.tables.isls.clone();
        let mut reset = 0;
        let mut removed = 0;

        let query = datapath_query::<AssociationEntry>(ct_id, dp_id)?;
        for mut entry in self.find(associations.as_ref(), query).await? {
            match (entry.status(), entry.vm_id, entry.vm_port) {
                (Some(status), Some(vm_id), Some(vm_port)) if status.is_bound() => {
                    entry.make_idle_vm()?;
                    self.upsert(associations.as_ref(), entry).await?;
                    self.send_port_config(vm_id, vm_port, PortConfigOp::Reset).await?;
                    reset += 1;
                }
                _ => {
                    self.delete(associations.as_ref(), &entry).await?;
                    removed += 1;
                }
            }
        }

        let query = datapath_query::<IslEntry>(ct_id, dp_id)?;
        for entry in self.find(isls.as_ref(), query).await? {
            self.delete(isls.as_ref(), &entry).await?;
            removed += 1;
        }

        for mut entry in self.find(isls.as_ref(), isl_remote_query(ct_id, dp_id)?).await? {
            if entry.status() == Some(IslStatus::Active) {
                entry.make_idle_local()?;
                self.upsert(isls.as_ref(), entry).await?;
                reset += 1;
            } else {
                self.delete(isls.as_ref(), &entry).await?;
                removed += 1;
            }
        }

        info!(ct_id, dp_id = %format_id(dp_id), reset, removed, "datapath down");
        Ok(())
    }

    /// A virtual router port was attached to the overlay switch.
    pub async fn map_port(
        &mut self,
        vm_id: u64,
        vm_port: u32,
        vs_id: u64,
        vs_port: u32,
    ) -> Result<()> {
        let associations = self.tables.associations.clone();
        let Some(mut entry) = self.find_one(associations.as_ref(), vm_port_query(vm_id, vm_port)?).await? else {
            info!(vm_id = %format_id(vm_id), vm_port, "overlay mapping for unknown VM port, ignoring");
            return Ok(());
        };

        let (ct_id, dp_id, dp_port) = match (entry.status(), bound_port(&entry)) {
            (Some(AssociationStatus::Associated), Some(port)) => port,
            (status, _) => {
                debug!(%entry, ?status, "overlay mapping for entry that is not associated, ignoring");
                return Ok(());
            }
        };

        entry.activate(vs_id, vs_port)?;
        let entry = self.upsert(associations.as_ref(), entry).await?;
        info!(%entry, "VM port active");

        let message = Message::DataPlaneMap(DataPlaneMap {
            ct_id,
            dp_id,
            dp_port,
            vs_id,
            vs_port,
        });
        self.send_to_controller(ct_id, message).await
    }

    /// Sends the default flows to a datapath the first time it is seen.
    async fn configure_datapath(&mut self, ct_id: u64, dp_id: u64, overlay: bool) -> Result<()> {
        if !self.configured.insert((ct_id, dp_id)) {
            return Ok(());
        }

        let flows = if overlay {
            vec![DefaultFlow::All]
        } else {
            self.config.datapath.default_flows.clone()
        };
        info!(ct_id, dp_id = %format_id(dp_id), overlay, flows = flows.len(), "configuring datapath");
        for flow in flows {
            debug!(ct_id, dp_id = %format_id(dp_id), %flow, "sending default flow");
            self.send_route_mod(ct_id, flow.route_mod(dp_id)).await?;
        }
        Ok(())
    }

    async fn send_port_config(&self, vm_id: u64, vm_port: u32, operation: PortConfigOp) -> Result<()> {
        let message = Message::PortConfig(PortConfig {
            vm_id,
            vm_port,
            operation,
        });
        let channel = self.config.server.client_channel.clone();
        self.send(&channel, &vm_id.to_string(), message).await
    }

    /// Tags, checks and sends a route modification to its controller.
    ///
    /// A route modification the translator rejects is dropped with a
    /// warning; it is not an error for the caller.
    async fn send_route_mod(&self, ct_id: u64, rm: RouteMod) -> Result<()> {
        let dp_id = rm.id;
        match prepare_route_mod(ct_id, rm) {
            Ok(rm) => self.send_to_controller(ct_id, Message::RouteMod(rm)).await,
            Err(e) => {
                warn!(ct_id, dp_id = %format_id(dp_id), error = %e, "dropping untranslatable route mod");
                Ok(())
            }
        }
    }

    async fn send_to_controller(&self, ct_id: u64, message: Message) -> Result<()> {
        let channel = self.config.server.proxy_channel.clone();
        self.send(&channel, &ct_id.to_string(), message).await
    }

    async fn send(&self, channel: &str, to: &str, message: Message) -> Result<()> {
        self.bounded("IPC send", self.ipc.send(channel, to, &message))
            .await
    }

    async fn find<E: TableEntry>(&self, table: &dyn Table<E>, query: Query) -> Result<Vec<E>> {
        self.bounded("table find", table.find(&query)).await
    }

    async fn find_one<E: TableEntry>(
        &self,
        table: &dyn Table<E>,
        query: Query,
    ) -> Result<Option<E>> {
        self.bounded("table find", table.find_one(&query)).await
    }

    async fn upsert<E: TableEntry>(&self, table: &dyn Table<E>, entry: E) -> Result<E> {
        self.bounded("table upsert", table.upsert(entry)).await
    }

    async fn delete<E: TableEntry>(&self, table: &dyn Table<E>, entry: &E) -> Result<()> {
        self.bounded("table delete", table.delete(entry)).await
    }

    /// Runs a store or transport call within the operation budget.
    async fn bounded<T, E>(
        &self,
        what: &'static str,
        call: impl Future<Output = std::result::Result<T, E>>,
    ) -> Result<T>
    where
        ServerError: From<E>,
    {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ServerError::Timeout(what)),
        }
    }
}
