//! Route modification fan-out and ISL stitching.

use super::{bound_port, datapath_query, isl_remote_query, prepare_route_mod, vm_port_query, RfServer};
use crate::error::Result;
use rf_protocol::{Action, Match, Message, RouteMod, RouteModOp};
use rf_table::{AssociationEntry, IslEntry, IslStatus};
use rf_types::format_id;
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::{debug, info, warn};

impl RfServer {
    /// A virtual router installed or withdrew a route.
    ///
    /// The route is addressed to a VM port. It is rewritten for the switch
    /// port bound to that VM port, copied for traffic entering on every
    /// other port of the same switch, and carried across active
    /// inter-switch links to every reachable switch.
    ///
    /// Every resulting command is translated before any is sent. If one
    /// of them is rejected, none are sent.
    pub async fn register_route_mod(&mut self, rm: RouteMod) -> Result<()> {
        let vm_id = rm.id;
        let Some((index, vm_port)) = rm.output_port() else {
            info!(vm_id = %format_id(vm_id), op = rm.op.as_str(), "route mod without output port, dropping");
            return Ok(());
        };

        let associations = self.tables.associations.clone();
        let entry = self
            .find_one(associations.as_ref(), vm_port_query(vm_id, vm_port)?)
            .await?;
        let Some((ct_id, dp_id, dp_port)) = entry.as_ref().and_then(bound_port) else {
            info!(vm_id = %format_id(vm_id), vm_port, "route mod for unassociated VM port, dropping");
            return Ok(());
        };

        let mut base = rm;
        base.id = dp_id;
        match base.op {
            RouteModOp::Add => base.actions[index] = Action::Output(dp_port),
            RouteModOp::Delete => {
                base.actions.remove(index);
            }
        }

        let mut plan = Vec::new();
        self.plan_datapath(ct_id, dp_id, dp_port, &base, &mut plan).await?;

        let mut visited = HashSet::from([(ct_id, dp_id)]);
        let mut frontier = VecDeque::from([(ct_id, dp_id)]);
        while let Some((ct, dp)) = frontier.pop_front() {
            let isls = self.tables.isls.clone();
            for link in self.find(isls.as_ref(), isl_remote_query(ct, dp)?).await? {
                let (Some(local), Some(remote)) = (link.local, link.remote) else {
                    continue;
                };
                if !visited.insert((local.ct_id, local.dp_id)) {
                    continue;
                }

                let mut stitched = base.clone();
                stitched.id = local.dp_id;
                stitched.actions = match base.op {
                    RouteModOp::Add => vec![
                        Action::SetEthSrc(local.eth_addr),
                        Action::SetEthDst(remote.eth_addr),
                        Action::Output(local.dp_port),
                    ],
                    RouteModOp::Delete => Vec::new(),
                };
                debug!(from = %format_id(dp), to = %format_id(local.dp_id), port = local.dp_port, "stitching route");

                self.plan_datapath(local.ct_id, local.dp_id, local.dp_port, &stitched, &mut plan)
                    .await?;
                frontier.push_back((local.ct_id, local.dp_id));
            }
        }

        let mut commands = Vec::with_capacity(plan.len());
        for (ct, rm) in plan {
            let dp = rm.id;
            match prepare_route_mod(ct, rm) {
                Ok(rm) => commands.push((ct, rm)),
                Err(e) => {
                    warn!(
                        vm_id = %format_id(vm_id),
                        vm_port,
                        dp_id = %format_id(dp),
                        error = %e,
                        "route mod cannot be translated, dropping it on every datapath"
                    );
                    return Ok(());
                }
            }
        }

        let sent = commands.len();
        for (ct, rm) in commands {
            self.send_to_controller(ct, Message::RouteMod(rm)).await?;
        }

        info!(
            vm_id = %format_id(vm_id),
            vm_port,
            op = base.op.as_str(),
            datapaths = visited.len(),
            commands = sent,
            "route mod applied"
        );
        Ok(())
    }

    /// Queues `rm` for a switch, plus one copy per other active port of the
    /// switch matching traffic that enters on that port.
    async fn plan_datapath(
        &self,
        ct_id: u64,
        dp_id: u64,
        programmed_port: u32,
        rm: &RouteMod,
        plan: &mut Vec<(u64, RouteMod)>,
    ) -> Result<()> {
        plan.push((ct_id, rm.clone()));

        for port in self.datapath_ports(ct_id, dp_id).await? {
            if port == programmed_port {
                continue;
            }
            let mut copy = rm.clone();
            copy.matches.push(Match::InPort(port));
            plan.push((ct_id, copy));
        }
        Ok(())
    }

    /// Bound association ports and active ISL ports of a switch.
    async fn datapath_ports(&self, ct_id: u64, dp_id: u64) -> Result<BTreeSet<u32>> {
        let mut ports = BTreeSet::new();

        let associations = self.tables.associations.clone();
        let query = datapath_query::<AssociationEntry>(ct_id, dp_id)?;
        for entry in self.find(associations.as_ref(), query).await? {
            if let Some((_, _, port)) = bound_port(&entry) {
                ports.insert(port);
            }
        }

        let isls = self.tables.isls.clone();
        let query = datapath_query::<IslEntry>(ct_id, dp_id)?;
        for entry in self.find(isls.as_ref(), query).await? {
            if let (Some(IslStatus::Active), Some(local)) = (entry.status(), entry.local) {
                ports.insert(local.dp_port);
            }
        }

        Ok(ports)
    }
}
