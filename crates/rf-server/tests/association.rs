//! VM port / datapath port association through the engine.

mod common;

use common::{mac, Harness};
use pretty_assertions::assert_eq;
use rf_protocol::{DataPlaneMap, PortConfig, PortConfigOp, RouteModOp, RouteOption};
use rf_server::{DefaultFlow, RfServerConfig};
use rf_table::{AssociationEntry, AssociationStatus, ConfigEntry, Query, Table};

const VM: u64 = 0x1;
const CT: u64 = 1;
const DP: u64 = 0x10;

fn scenario_config() -> Vec<ConfigEntry> {
    vec![ConfigEntry::new(VM, 0, CT, DP, 2)]
}

fn map_request(vm_id: u64, vm_port: u32) -> (String, PortConfig) {
    (
        vm_id.to_string(),
        PortConfig {
            vm_id,
            vm_port,
            operation: PortConfigOp::MapRequest,
        },
    )
}

fn reset(vm_id: u64, vm_port: u32) -> (String, PortConfig) {
    (
        vm_id.to_string(),
        PortConfig {
            vm_id,
            vm_port,
            operation: PortConfigOp::Reset,
        },
    )
}

fn statuses(entries: &[AssociationEntry]) -> Vec<Option<AssociationStatus>> {
    entries.iter().map(AssociationEntry::status).collect()
}

#[tokio::test]
async fn test_vm_port_then_datapath_port_associates() {
    let mut h = Harness::new(scenario_config(), Vec::new());

    h.vm_port(VM, 0).await;
    assert!(h.port_configs().is_empty());
    h.dp_port(CT, DP, 2).await;

    let entries = h.associations().await;
    assert_eq!(statuses(&entries), vec![Some(AssociationStatus::Associated)]);
    assert_eq!(entries[0].eth_addr, Some(mac(0)));
    assert_eq!(h.port_configs(), vec![map_request(VM, 0)]);
}

#[tokio::test]
async fn test_overlay_mapping_activates_entry() {
    let mut h = Harness::new(scenario_config(), Vec::new());
    h.vm_port(VM, 0).await;
    h.dp_port(CT, DP, 2).await;

    h.map(VM, 0, 9, 4).await;

    let entries = h.associations().await;
    assert_eq!(statuses(&entries), vec![Some(AssociationStatus::Active)]);
    assert_eq!(
        h.data_plane_maps(),
        vec![(
            CT.to_string(),
            DataPlaneMap {
                ct_id: CT,
                dp_id: DP,
                dp_port: 2,
                vs_id: 9,
                vs_port: 4,
            }
        )]
    );

    // A duplicate mapping is ignored.
    h.map(VM, 0, 9, 4).await;
    assert_eq!(h.data_plane_maps().len(), 1);
}

#[tokio::test]
async fn test_overlay_mapping_for_idle_entry_is_ignored() {
    let mut h = Harness::new(scenario_config(), Vec::new());
    h.vm_port(VM, 0).await;

    h.map(VM, 0, 9, 4).await;
    h.map(0x77, 0, 9, 5).await;

    let entries = h.associations().await;
    assert_eq!(statuses(&entries), vec![Some(AssociationStatus::IdleVmPort)]);
    assert!(h.sent().is_empty());
}

#[tokio::test]
async fn test_datapath_port_then_vm_port_associates() {
    let mut h = Harness::new(scenario_config(), Vec::new());

    h.dp_port(CT, DP, 2).await;
    assert_eq!(
        statuses(&h.associations().await),
        vec![Some(AssociationStatus::IdleDpPort)]
    );
    h.vm_port(VM, 0).await;

    assert_eq!(
        statuses(&h.associations().await),
        vec![Some(AssociationStatus::Associated)]
    );
    assert_eq!(h.port_configs(), vec![map_request(VM, 0)]);
}

#[tokio::test]
async fn test_repeated_registration_is_idempotent() {
    let mut h = Harness::new(scenario_config(), Vec::new());

    h.vm_port(VM, 0).await;
    h.vm_port(VM, 0).await;
    assert_eq!(h.associations().await.len(), 1);

    h.dp_port(CT, DP, 2).await;
    h.dp_port(CT, DP, 2).await;
    h.vm_port(VM, 0).await;

    assert_eq!(
        statuses(&h.associations().await),
        vec![Some(AssociationStatus::Associated)]
    );
    assert_eq!(h.port_configs().len(), 1);
}

#[tokio::test]
async fn test_unconfigured_ports_stay_idle() {
    let mut h = Harness::new(scenario_config(), Vec::new());

    h.vm_port(0x2, 0).await;
    h.dp_port(CT, DP, 7).await;

    let mut found = statuses(&h.associations().await);
    found.sort_by_key(|s| s.map(|s| s as u8));
    assert_eq!(
        found,
        vec![
            Some(AssociationStatus::IdleVmPort),
            Some(AssociationStatus::IdleDpPort),
        ]
    );
    assert!(h.port_configs().is_empty());
}

#[tokio::test]
async fn test_conflicting_claim_keeps_first_binding() {
    let mut h = Harness::new(scenario_config(), Vec::new());

    // The configured switch port is already bound to another VM.
    let mut other = AssociationEntry::idle_vm(0x2, 0, None);
    other.associate_dp(CT, DP, 2).unwrap();
    h.tables.associations.upsert(other).await.unwrap();

    h.vm_port(VM, 0).await;

    let entries = h.associations().await;
    assert_eq!(entries.len(), 2);
    let bound: Vec<_> = entries.iter().filter(|e| e.dp_id.is_some()).collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].vm_id, Some(0x2));
    let newcomer = entries.iter().find(|e| e.vm_id == Some(VM)).unwrap();
    assert_eq!(newcomer.status(), Some(AssociationStatus::IdleVmPort));
    assert!(h.port_configs().is_empty());
}

#[tokio::test]
async fn test_datapath_down_reverts_every_entry() {
    let config = vec![
        ConfigEntry::new(VM, 0, CT, DP, 1),
        ConfigEntry::new(VM, 1, CT, DP, 2),
        ConfigEntry::new(0x2, 0, CT, 0x20, 1),
    ];
    let mut h = Harness::new(config, Vec::new());
    for (vm_id, vm_port) in [(VM, 0), (VM, 1), (0x2, 0)] {
        h.vm_port(vm_id, vm_port).await;
    }
    h.dp_port(CT, DP, 1).await;
    h.dp_port(CT, DP, 2).await;
    h.dp_port(CT, DP, 3).await;
    h.dp_port(CT, 0x20, 1).await;
    h.map(VM, 1, 9, 4).await;
    h.bus.clear_history();

    h.dp_down(CT, DP).await;

    let entries = h.associations().await;
    assert_eq!(entries.len(), 3);
    for entry in &entries {
        if entry.vm_id == Some(0x2) {
            assert_eq!(entry.status(), Some(AssociationStatus::Associated));
        } else {
            assert_eq!(entry.status(), Some(AssociationStatus::IdleVmPort));
            assert_eq!(entry.vs_id, None);
            assert_eq!(entry.vs_port, None);
        }
    }

    let mut resets = h.port_configs();
    resets.sort_by_key(|(_, m)| m.vm_port);
    assert_eq!(resets, vec![reset(VM, 0), reset(VM, 1)]);
}

#[tokio::test]
async fn test_datapath_reconnect_reassociates_without_default_flows() {
    let mut h = Harness::new(scenario_config(), Vec::new());
    h.vm_port(VM, 0).await;
    h.dp_port(CT, DP, 2).await;
    h.dp_down(CT, DP).await;
    h.bus.clear_history();

    h.dp_port(CT, DP, 2).await;

    assert_eq!(
        statuses(&h.associations().await),
        vec![Some(AssociationStatus::Associated)]
    );
    assert_eq!(h.port_configs(), vec![map_request(VM, 0)]);
    assert!(h.route_mods().is_empty());
}

#[tokio::test]
async fn test_default_flows_sent_once_per_datapath() {
    let mut h = Harness::new(Vec::new(), Vec::new());

    h.dp_port(CT, DP, 1).await;
    h.dp_port(CT, DP, 2).await;
    h.dp_port(CT, 0x20, 1).await;
    h.dp_port(2, DP, 1).await;

    let sent = h.route_mods();
    assert_eq!(sent.len(), 3 * DefaultFlow::STANDARD.len());
    for chunk in sent.chunks(DefaultFlow::STANDARD.len()) {
        let (_, first) = &chunk[0];
        assert_eq!(first.op, RouteModOp::Delete);
        assert!(first.matches.is_empty());
    }

    let targets: Vec<(String, u64)> = sent
        .iter()
        .step_by(DefaultFlow::STANDARD.len())
        .map(|(to, rm)| (to.clone(), rm.id))
        .collect();
    assert_eq!(
        targets,
        vec![
            ("1".to_string(), DP),
            ("1".to_string(), 0x20),
            ("2".to_string(), DP),
        ]
    );
    for (to, rm) in &sent {
        assert_eq!(rm.ct_id().map(|ct| ct.to_string()).as_ref(), Some(to));
    }
}

#[tokio::test]
async fn test_configured_default_flows() {
    let mut config = RfServerConfig::default();
    config.datapath.default_flows = vec![DefaultFlow::ClearFlowTable, DefaultFlow::Arp];
    let mut h = Harness::with_config(config, Vec::new(), Vec::new());

    h.dp_port(CT, DP, 1).await;

    let sent = h.route_mods();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1, {
        let mut rm = DefaultFlow::Arp.route_mod(DP);
        rm.set_ct_id(CT);
        rm
    });
}

#[tokio::test]
async fn test_overlay_switch_gets_single_rule() {
    let mut h = Harness::new(Vec::new(), Vec::new());
    let rfvs = 0x7266_7673_0000_0001;

    h.dp_port(CT, rfvs, 1).await;
    h.dp_port(CT, rfvs, 2).await;

    let sent = h.route_mods();
    assert_eq!(sent.len(), 1);
    let (_, rm) = &sent[0];
    assert_eq!(rm.id, rfvs);
    assert!(rm.matches.is_empty());
    assert_eq!(
        rm.options,
        vec![RouteOption::Priority(0x8020), RouteOption::CtId(CT)]
    );
    assert!(h.associations().await.is_empty());
}

#[tokio::test]
async fn test_initialize_publishes_config_and_clears_state() {
    let mut h = Harness::new(scenario_config(), Vec::new());
    h.vm_port(0x2, 0).await;

    h.server.initialize().await.unwrap();

    assert!(h.associations().await.is_empty());
    let published = h
        .tables
        .config
        .find(&Query::all::<ConfigEntry>())
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].vm_id, VM);
    assert_eq!(published[0].dp_port, 2);

    let mut config = RfServerConfig::default();
    config.server.clear_tables_on_start = false;
    let mut h = Harness::with_config(config, scenario_config(), Vec::new());
    h.vm_port(0x2, 0).await;
    h.server.initialize().await.unwrap();
    assert_eq!(h.associations().await.len(), 1);
}
