//! Shared fixtures for the server integration tests.

#![allow(dead_code)]

use rf_ipc::{IpcService, MemoryBus};
use rf_protocol::{
    DataPlaneMap, DatapathDown, DatapathPortRegister, Envelope, Message, PortConfig, PortRegister,
    RouteMod, VirtualPlaneMap,
};
use rf_server::{RfServer, RfServerConfig, StaticConfig, Tables};
use rf_table::{
    AssociationEntry, ConfigEntry, IslConfigEntry, IslEndpoint, IslEntry, Query, Table,
};
use rf_types::MacAddress;
use std::sync::Arc;

pub const CLIENT_CHANNEL: &str = "rfclient<->rfserver";
pub const PROXY_CHANNEL: &str = "rfserver<->rfproxy";

pub fn mac(last: u8) -> MacAddress {
    MacAddress::new([0x02, 0xa0, 0, 0, 0, last])
}

pub struct Harness {
    pub bus: MemoryBus,
    pub server: RfServer,
    pub tables: Tables,
}

impl Harness {
    pub fn new(entries: Vec<ConfigEntry>, links: Vec<IslConfigEntry>) -> Self {
        Self::with_config(RfServerConfig::default(), entries, links)
    }

    pub fn with_config(
        config: RfServerConfig,
        entries: Vec<ConfigEntry>,
        links: Vec<IslConfigEntry>,
    ) -> Self {
        let bus = MemoryBus::new();
        let ipc: Arc<dyn IpcService> = Arc::new(bus.service("rfserver"));
        let tables = Tables::in_memory();
        let server = RfServer::new(
            Arc::new(config),
            Arc::new(StaticConfig::new(entries, links)),
            ipc,
            tables.clone(),
        );
        Self { bus, server, tables }
    }

    pub async fn send(&mut self, message: Message) {
        let channel = match &message {
            Message::PortRegister(_) | Message::RouteMod(_) => CLIENT_CHANNEL,
            _ => PROXY_CHANNEL,
        };
        let envelope = Envelope::new("test", "rfserver", channel, message);
        self.server.process(envelope).await.unwrap();
    }

    pub async fn vm_port(&mut self, vm_id: u64, vm_port: u32) {
        self.send(Message::PortRegister(PortRegister {
            vm_id,
            vm_port,
            hwaddress: mac(vm_port as u8),
        }))
        .await;
    }

    pub async fn dp_port(&mut self, ct_id: u64, dp_id: u64, dp_port: u32) {
        self.send(Message::DatapathPortRegister(DatapathPortRegister {
            ct_id,
            dp_id,
            dp_port,
        }))
        .await;
    }

    pub async fn dp_down(&mut self, ct_id: u64, dp_id: u64) {
        self.send(Message::DatapathDown(DatapathDown { ct_id, dp_id }))
            .await;
    }

    pub async fn map(&mut self, vm_id: u64, vm_port: u32, vs_id: u64, vs_port: u32) {
        self.send(Message::VirtualPlaneMap(VirtualPlaneMap {
            vm_id,
            vm_port,
            vs_id,
            vs_port,
        }))
        .await;
    }

    pub async fn associations(&self) -> Vec<AssociationEntry> {
        self.tables
            .associations
            .find(&Query::all::<AssociationEntry>())
            .await
            .unwrap()
    }

    pub async fn isls(&self) -> Vec<IslEntry> {
        self.tables
            .isls
            .find(&Query::all::<IslEntry>())
            .await
            .unwrap()
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.bus.history()
    }

    pub fn port_configs(&self) -> Vec<(String, PortConfig)> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e.message {
                Message::PortConfig(m) => Some((e.to, m)),
                _ => None,
            })
            .collect()
    }

    pub fn data_plane_maps(&self) -> Vec<(String, DataPlaneMap)> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e.message {
                Message::DataPlaneMap(m) => Some((e.to, m)),
                _ => None,
            })
            .collect()
    }

    pub fn route_mods(&self) -> Vec<(String, RouteMod)> {
        self.sent()
            .into_iter()
            .filter_map(|e| match e.message {
                Message::RouteMod(rm) => Some((e.to, rm)),
                _ => None,
            })
            .collect()
    }
}

pub fn endpoint(ct_id: u64, dp_id: u64, dp_port: u32) -> IslEndpoint {
    IslEndpoint::new(ct_id, dp_id, dp_port, mac(dp_port as u8))
}
