//! RouteMod to FlowSpec translation.

use crate::error::{Result, TranslateError};
use crate::spec::{FlowAction, FlowCommand, FlowMatch, FlowSpec, OutputPort, Timeout};
use log::debug;
use rf_protocol::{is_optional_kind, Action, Match, RouteMod, RouteModOp, RouteOption};

/// Priority used when the route modification carries none.
pub const DEFAULT_PRIORITY: u16 = 0x8000;

/// Sets a single-valued attribute, rejecting a second, different value.
fn assign<T: PartialEq>(slot: &mut Option<T>, value: T, conflict: TranslateError) -> Result<()> {
    match slot {
        Some(existing) if *existing != value => Err(conflict),
        _ => {
            *slot = Some(value);
            Ok(())
        }
    }
}

fn translate_match(pattern: &mut FlowMatch, m: &Match) -> Result<()> {
    let conflict = TranslateError::ConflictingMatch(m.kind());
    match m {
        Match::Ipv4(prefix) => assign(&mut pattern.nw_dst, *prefix, conflict),
        Match::Ethernet(mac) => assign(&mut pattern.dl_dst, *mac, conflict),
        Match::Ethertype(t) => assign(&mut pattern.dl_type, *t, conflict),
        Match::NwProto(p) => assign(&mut pattern.nw_proto, *p, conflict),
        Match::TpSrc(p) => assign(&mut pattern.tp_src, *p, conflict),
        Match::TpDst(p) => assign(&mut pattern.tp_dst, *p, conflict),
        Match::InPort(p) => assign(&mut pattern.in_port, *p, conflict),
        Match::Other { kind, .. } if is_optional_kind(*kind) => {
            debug!("Skipping optional match kind {}", kind);
            Ok(())
        }
        Match::Other { kind, .. } => Err(TranslateError::UnsupportedMatch(*kind)),
    }
}

fn translate_action(actions: &mut Vec<FlowAction>, a: &Action) -> Result<()> {
    match a {
        Action::Output(port) => actions.push(FlowAction::Output(OutputPort::from_port(*port))),
        Action::SetEthSrc(mac) => actions.push(FlowAction::SetDlSrc(*mac)),
        Action::SetEthDst(mac) => actions.push(FlowAction::SetDlDst(*mac)),
        Action::Other { kind, .. } if is_optional_kind(*kind) => {
            debug!("Skipping optional action kind {}", kind);
        }
        Action::Other { kind, .. } => return Err(TranslateError::UnsupportedAction(*kind)),
    }
    Ok(())
}

#[derive(Default)]
struct Options {
    priority: Option<u16>,
    idle_timeout: Option<u16>,
    hard_timeout: Option<u16>,
    controller: Option<u64>,
}

fn translate_option(options: &mut Options, o: &RouteOption) -> Result<()> {
    let conflict = TranslateError::ConflictingOption(o.kind());
    match o {
        RouteOption::Priority(p) => assign(&mut options.priority, *p, conflict),
        RouteOption::IdleTimeout(t) => assign(&mut options.idle_timeout, *t, conflict),
        RouteOption::HardTimeout(t) => assign(&mut options.hard_timeout, *t, conflict),
        RouteOption::CtId(ct) => assign(&mut options.controller, *ct, conflict),
        RouteOption::Other { kind, .. } if is_optional_kind(*kind) => {
            debug!("Skipping optional option kind {}", kind);
            Ok(())
        }
        RouteOption::Other { kind, .. } => Err(TranslateError::UnsupportedOption(*kind)),
    }
}

/// Translates a route modification into flow attributes.
///
/// # Errors
///
/// Fails if any entry uses a required kind this translator does not
/// implement, or sets the same field twice with different values.
pub fn translate(rm: &RouteMod) -> Result<FlowSpec> {
    let mut pattern = FlowMatch::default();
    for m in &rm.matches {
        translate_match(&mut pattern, m)?;
    }

    let mut actions = Vec::with_capacity(rm.actions.len());
    for a in &rm.actions {
        translate_action(&mut actions, a)?;
    }

    let mut options = Options::default();
    for o in &rm.options {
        translate_option(&mut options, o)?;
    }

    Ok(FlowSpec {
        datapath_id: rm.id,
        command: match rm.op {
            RouteModOp::Add => FlowCommand::Add,
            RouteModOp::Delete => FlowCommand::Delete,
        },
        pattern,
        actions,
        priority: options.priority.unwrap_or(DEFAULT_PRIORITY),
        idle_timeout: Timeout::from_secs(options.idle_timeout.unwrap_or(0)),
        hard_timeout: Timeout::from_secs(options.hard_timeout.unwrap_or(0)),
        controller: options.controller,
    })
}

/// Translates a route modification and drops the optional entries the
/// translator skipped.
///
/// The returned route modification describes exactly the flow in the
/// returned [`FlowSpec`].
///
/// # Errors
///
/// Fails whenever [`translate`] fails.
pub fn normalize(mut rm: RouteMod) -> Result<(RouteMod, FlowSpec)> {
    let flow = translate(&rm)?;
    // Only optional kinds survive translation as `Other`.
    rm.matches.retain(|m| !matches!(m, Match::Other { .. }));
    rm.actions.retain(|a| !matches!(a, Action::Other { .. }));
    rm.options.retain(|o| !matches!(o, RouteOption::Other { .. }));
    Ok((rm, flow))
}
