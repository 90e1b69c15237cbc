//! Route modification payload.

use crate::error::{FieldError, ProtocolError, Result};
use crate::fields::{FieldValues, FieldValuesExt};
use crate::tlv::{Action, Match, RouteOption};
use std::fmt;

/// Route modification operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteModOp {
    Add = 0,
    Delete = 1,
}

impl RouteModOp {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RouteModOp::Add),
            1 => Some(RouteModOp::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteModOp::Add => "add",
            RouteModOp::Delete => "delete",
        }
    }
}

impl fmt::Display for RouteModOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An abstract add/delete flow command.
///
/// `id` is the target: a VM id when the virtual router sends the command,
/// a datapath id once the server has resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMod {
    pub op: RouteModOp,
    pub id: u64,
    pub matches: Vec<Match>,
    pub actions: Vec<Action>,
    pub options: Vec<RouteOption>,
}

impl RouteMod {
    pub fn new(op: RouteModOp, id: u64) -> Self {
        Self {
            op,
            id,
            matches: Vec::new(),
            actions: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn with_match(mut self, m: Match) -> Self {
        self.matches.push(m);
        self
    }

    pub fn with_action(mut self, a: Action) -> Self {
        self.actions.push(a);
        self
    }

    pub fn with_option(mut self, o: RouteOption) -> Self {
        self.options.push(o);
        self
    }

    /// Returns the index and port of the first output action.
    pub fn output_port(&self) -> Option<(usize, u32)> {
        self.actions.iter().enumerate().find_map(|(i, a)| match a {
            Action::Output(port) => Some((i, *port)),
            _ => None,
        })
    }

    /// Returns the controller tag, if any.
    pub fn ct_id(&self) -> Option<u64> {
        self.options.iter().find_map(|o| match o {
            RouteOption::CtId(ct) => Some(*ct),
            _ => None,
        })
    }

    /// Replaces any controller tag with `ct_id`.
    pub fn set_ct_id(&mut self, ct_id: u64) {
        self.options.retain(|o| !matches!(o, RouteOption::CtId(_)));
        self.options.push(RouteOption::CtId(ct_id));
    }

    pub(crate) fn encode_into(&self, fvs: &mut FieldValues) {
        fvs.push(("mod".to_string(), self.op.code().to_string()));
        fvs.push(("id".to_string(), self.id.to_string()));
        encode_list(fvs, "matches", "match", self.matches.iter().map(|m| (m.kind(), m.value())));
        encode_list(fvs, "actions", "action", self.actions.iter().map(|a| (a.kind(), a.value())));
        encode_list(fvs, "options", "option", self.options.iter().map(|o| (o.kind(), o.value())));
    }

    pub(crate) fn decode(fvs: &FieldValues) -> Result<Self> {
        let code: u8 = fvs.require_num("mod")?;
        let op = RouteModOp::from_code(code)
            .ok_or_else(|| FieldError::invalid("mod", code.to_string()))?;
        let id = fvs.require_num("id")?;

        Ok(Self {
            op,
            id,
            matches: decode_list(fvs, "matches", "match", Match::from_parts)?,
            actions: decode_list(fvs, "actions", "action", Action::from_parts)?,
            options: decode_list(fvs, "options", "option", RouteOption::from_parts)?,
        })
    }
}

impl fmt::Display for RouteMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RouteMod({} id={:016x} matches={} actions={} options={})",
            self.op,
            self.id,
            self.matches.len(),
            self.actions.len(),
            self.options.len()
        )
    }
}

// Lists flatten to "<count_key>" = N plus "<prefix>.<i>.type" / "<prefix>.<i>.value".
fn encode_list(
    fvs: &mut FieldValues,
    count_key: &str,
    prefix: &str,
    items: impl ExactSizeIterator<Item = (u8, String)>,
) {
    fvs.push((count_key.to_string(), items.len().to_string()));
    for (i, (kind, value)) in items.enumerate() {
        fvs.push((format!("{}.{}.type", prefix, i), kind.to_string()));
        fvs.push((format!("{}.{}.value", prefix, i), value));
    }
}

fn decode_list<T>(
    fvs: &FieldValues,
    count_key: &str,
    prefix: &str,
    parse: impl Fn(usize, u8, &str) -> Result<T>,
) -> Result<Vec<T>> {
    let count: usize = fvs.optional_num(count_key)?.unwrap_or(0);
    let mut items = Vec::with_capacity(count);
    for i in 0..count {
        let type_key = format!("{}.{}.type", prefix, i);
        let value_key = format!("{}.{}.value", prefix, i);
        let kind: u8 = fvs.require_num(&type_key)?;
        // An empty value is legal for valueless kinds such as drop
        let value = fvs
            .get_field(&value_key)
            .ok_or_else(|| ProtocolError::from(FieldError::missing(value_key.clone())))?;
        items.push(parse(i, kind, value)?);
    }
    Ok(items)
}
